//! ACME issuance over DNS-01 using `instant-acme`.

use async_trait::async_trait;
use dashmap::DashMap;
use instant_acme::{
    Account, AuthorizationStatus, ChallengeType, Identifier, NewAccount, NewOrder, Order,
    OrderStatus,
};
use rcgen::{CertificateParams, DistinguishedName, KeyPair};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{sleep, Instant};
use tracing::{debug, info, instrument, warn};

use super::chain::split_chain;
use super::dns01::{challenge_fqdn, CommandDns01Provider, Dns01Provider};
use super::CertificateIssuer;
use crate::config::AcmeConfig;
use crate::domain::{CertificateMaterial, PrivateKeyPem};
use crate::errors::{CertKeeperError, Result};

/// Attempts at downloading the certificate once the order is valid
const CERTIFICATE_FETCH_ATTEMPTS: u32 = 5;

/// A TXT record published for one authorization
struct PresentedChallenge {
    fqdn: String,
    value: String,
    url: String,
}

/// Issues certificates from an ACME directory.
///
/// One account is registered per email and reused for the process lifetime.
pub struct AcmeIssuer {
    directory_url: String,
    accept_terms_of_service: bool,
    propagation_timeout: Duration,
    polling_interval: Duration,
    dns_provider: Option<Arc<dyn Dns01Provider>>,
    accounts: DashMap<String, Account>,
}

impl AcmeIssuer {
    pub fn new(config: &AcmeConfig, dns_provider: Option<Arc<dyn Dns01Provider>>) -> Self {
        Self {
            directory_url: config.directory_url.clone(),
            accept_terms_of_service: config.accept_terms_of_service,
            propagation_timeout: config.propagation_timeout(),
            polling_interval: config.polling_interval(),
            dns_provider,
            accounts: DashMap::new(),
        }
    }

    /// Issuer using the configured DNS hook, if any
    pub fn from_config(config: &AcmeConfig) -> Self {
        let provider = config.dns_hook.as_ref().map(|hook| {
            Arc::new(CommandDns01Provider::new(
                hook,
                config.dns_ttl_seconds,
                config.propagation_timeout(),
            )) as Arc<dyn Dns01Provider>
        });
        if provider.is_none() {
            warn!("No DNS-01 hook configured; certificate issuance will fail");
        }
        Self::new(config, provider)
    }

    async fn account_for(&self, domain: &str, email: &str) -> Result<Account> {
        if let Some(account) = self.accounts.get(email) {
            return Ok(account.clone());
        }

        let contact = format!("mailto:{}", email);
        let new_account = NewAccount {
            contact: &[&contact],
            terms_of_service_agreed: self.accept_terms_of_service,
            only_return_existing: false,
        };

        let (account, _credentials) = Account::create(&new_account, &self.directory_url, None)
            .await
            .map_err(|e| {
                CertKeeperError::issuance_with_source(
                    domain,
                    "ACME account registration rejected",
                    Box::new(e),
                )
            })?;

        info!(email = %email, directory = %self.directory_url, "Registered ACME account");
        self.accounts.insert(email.to_string(), account.clone());
        Ok(account)
    }

    async fn present_challenges(
        &self,
        domain: &str,
        order: &mut Order,
        provider: &dyn Dns01Provider,
        presented: &mut Vec<PresentedChallenge>,
    ) -> Result<()> {
        let authorizations = order.authorizations().await.map_err(|e| {
            CertKeeperError::issuance_with_source(domain, "Failed to fetch authorizations", Box::new(e))
        })?;

        for authz in &authorizations {
            match authz.status {
                AuthorizationStatus::Pending => {}
                AuthorizationStatus::Valid => continue,
                ref status => {
                    return Err(CertKeeperError::issuance(
                        domain,
                        format!("Authorization is {:?}", status),
                    ))
                }
            }

            let challenge = authz
                .challenges
                .iter()
                .find(|c| c.r#type == ChallengeType::Dns01)
                .ok_or_else(|| CertKeeperError::issuance(domain, "CA offered no DNS-01 challenge"))?;

            let Identifier::Dns(name) = &authz.identifier;
            let fqdn = challenge_fqdn(name);
            let value = order.key_authorization(challenge).dns_value();

            provider.present(&fqdn, &value).await.map_err(|e| {
                CertKeeperError::issuance_with_source(
                    domain,
                    format!("DNS-01 provider failed to publish {}", fqdn),
                    Box::new(e),
                )
            })?;
            debug!(fqdn = %fqdn, "Published DNS-01 challenge record");
            presented.push(PresentedChallenge { fqdn, value, url: challenge.url.clone() });
        }

        Ok(())
    }

    /// Poll until the order leaves every state in `keep_waiting` or the deadline passes.
    async fn wait_for_order(
        &self,
        domain: &str,
        order: &mut Order,
        deadline: Instant,
        waiting_on: &str,
        keep_waiting: &[OrderStatus],
    ) -> Result<OrderStatus> {
        loop {
            let status = order
                .refresh()
                .await
                .map_err(|e| {
                    CertKeeperError::issuance_with_source(domain, "Failed to refresh order", Box::new(e))
                })?
                .status;

            if status == OrderStatus::Invalid {
                return Err(CertKeeperError::issuance(domain, "CA marked the order invalid"));
            }
            if !keep_waiting.contains(&status) {
                return Ok(status);
            }

            if Instant::now() + self.polling_interval > deadline {
                return Err(CertKeeperError::issuance(
                    domain,
                    format!("Timed out after {:?} waiting for {}", self.propagation_timeout, waiting_on),
                ));
            }
            sleep(self.polling_interval).await;
        }
    }

    async fn complete_order(
        &self,
        domain: &str,
        order: &mut Order,
        provider: &dyn Dns01Provider,
        presented: &mut Vec<PresentedChallenge>,
    ) -> Result<CertificateMaterial> {
        self.present_challenges(domain, order, provider, presented).await?;

        for challenge in presented.iter() {
            order.set_challenge_ready(&challenge.url).await.map_err(|e| {
                CertKeeperError::issuance_with_source(domain, "Failed to mark challenge ready", Box::new(e))
            })?;
        }

        let deadline = Instant::now() + self.propagation_timeout;
        let status = self
            .wait_for_order(
                domain,
                order,
                deadline,
                "domain validation",
                &[OrderStatus::Pending, OrderStatus::Processing],
            )
            .await?;
        if status != OrderStatus::Ready {
            return Err(CertKeeperError::issuance(
                domain,
                format!("Order is {:?} before a CSR was submitted", status),
            ));
        }

        let key = KeyPair::generate().map_err(|e| {
            CertKeeperError::issuance_with_source(domain, "Failed to generate key pair", Box::new(e))
        })?;
        let csr = build_csr(domain, &key)?;
        order.finalize(&csr).await.map_err(|e| {
            CertKeeperError::issuance_with_source(domain, "CA rejected the CSR", Box::new(e))
        })?;

        let status = self
            .wait_for_order(
                domain,
                order,
                deadline,
                "certificate issuance",
                &[OrderStatus::Ready, OrderStatus::Processing],
            )
            .await?;
        if status != OrderStatus::Valid {
            return Err(CertKeeperError::issuance(
                domain,
                format!("Order ended in unexpected state {:?}", status),
            ));
        }

        let chain = self.fetch_certificate(domain, order).await?;
        let (client_cert, issuer_cert) = split_chain(domain, &chain)?;

        Ok(CertificateMaterial {
            private_key: PrivateKeyPem::new(key.serialize_pem()),
            client_cert,
            issuer_cert,
        })
    }

    async fn fetch_certificate(&self, domain: &str, order: &mut Order) -> Result<String> {
        for _ in 0..CERTIFICATE_FETCH_ATTEMPTS {
            let chain = order.certificate().await.map_err(|e| {
                CertKeeperError::issuance_with_source(domain, "Failed to download certificate", Box::new(e))
            })?;
            if let Some(chain) = chain {
                return Ok(chain);
            }
            sleep(self.polling_interval).await;
        }
        Err(CertKeeperError::issuance(domain, "Certificate not available after order became valid"))
    }
}

/// DER-encoded CSR naming `domain` as its only subject alternative name
fn build_csr(domain: &str, key: &KeyPair) -> Result<Vec<u8>> {
    let mut params = CertificateParams::new(vec![domain.to_string()]).map_err(|e| {
        CertKeeperError::issuance_with_source(domain, "Invalid certificate parameters", Box::new(e))
    })?;
    params.distinguished_name = DistinguishedName::new();

    let csr = params.serialize_request(key).map_err(|e| {
        CertKeeperError::issuance_with_source(domain, "Failed to serialize CSR", Box::new(e))
    })?;
    Ok(csr.der().to_vec())
}

#[async_trait]
impl CertificateIssuer for AcmeIssuer {
    #[instrument(skip(self), fields(directory = %self.directory_url), name = "acme_issue")]
    async fn issue(&self, domain: &str, email: &str) -> Result<CertificateMaterial> {
        let provider = self
            .dns_provider
            .clone()
            .ok_or_else(|| CertKeeperError::issuance(domain, "DNS-01 provider not configured"))?;

        let account = self.account_for(domain, email).await?;
        let mut order = account
            .new_order(&NewOrder { identifiers: &[Identifier::Dns(domain.to_string())] })
            .await
            .map_err(|e| {
                CertKeeperError::issuance_with_source(domain, "CA rejected the order", Box::new(e))
            })?;

        let mut presented = Vec::new();
        let result = self.complete_order(domain, &mut order, provider.as_ref(), &mut presented).await;

        for challenge in &presented {
            if let Err(e) = provider.cleanup(&challenge.fqdn, &challenge.value).await {
                warn!(fqdn = %challenge.fqdn, error = %e, "Failed to remove DNS-01 challenge record");
            }
        }

        if result.is_ok() {
            info!(domain = %domain, "Certificate issued");
        }
        result
    }
}
