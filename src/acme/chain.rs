//! Splitting an issued PEM chain into leaf and issuer parts.

use pem::{EncodeConfig, LineEnding, Pem};

use crate::errors::{CertKeeperError, Result};

fn encode(block: &Pem) -> String {
    pem::encode_config(block, EncodeConfig::new().set_line_ending(LineEnding::LF))
}

/// Split a chain into the leaf certificate and the remaining chain.
///
/// Every block must be a `CERTIFICATE` holding a parseable X.509
/// certificate; anything else fails the issuance.
pub fn split_chain(domain: &str, chain: &str) -> Result<(String, String)> {
    let blocks = pem::parse_many(chain).map_err(|e| {
        CertKeeperError::issuance(domain, format!("CA returned an unreadable chain: {}", e))
    })?;

    for (index, block) in blocks.iter().enumerate() {
        if block.tag() != "CERTIFICATE" {
            return Err(CertKeeperError::issuance(
                domain,
                format!("chain entry {} is a {} block", index, block.tag()),
            ));
        }
        x509_parser::parse_x509_certificate(block.contents()).map_err(|e| {
            CertKeeperError::issuance(
                domain,
                format!("chain entry {} is not an X.509 certificate: {}", index, e),
            )
        })?;
    }

    let mut blocks = blocks.iter();
    let leaf = blocks
        .next()
        .ok_or_else(|| CertKeeperError::issuance(domain, "CA returned no certificate"))?;
    Ok((encode(leaf), blocks.map(encode).collect()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rcgen::{CertificateParams, KeyPair};

    fn certificate(name: &str) -> rcgen::Certificate {
        CertificateParams::new(vec![name.to_string()])
            .unwrap()
            .self_signed(&KeyPair::generate().unwrap())
            .unwrap()
    }

    #[test]
    fn test_split_chain_leaf_and_rest() {
        let leaf = certificate("example.com");
        let intermediate = certificate("intermediate.test");
        let root = certificate("root.test");
        let chain = format!("{}\n{}{}", leaf.pem(), intermediate.pem(), root.pem());

        let (client, issuer) = split_chain("example.com", &chain).unwrap();

        let parsed = pem::parse(&client).unwrap();
        assert_eq!(parsed.contents(), leaf.der().as_ref());
        let rest = pem::parse_many(&issuer).unwrap();
        assert_eq!(rest.len(), 2);
        assert_eq!(rest[0].contents(), intermediate.der().as_ref());
        assert_eq!(rest[1].contents(), root.der().as_ref());
        assert!(client.ends_with("-----END CERTIFICATE-----\n"));
    }

    #[test]
    fn test_split_chain_single_certificate() {
        let leaf = certificate("example.com");
        let (client, issuer) = split_chain("example.com", &leaf.pem()).unwrap();
        assert_eq!(pem::parse(&client).unwrap().contents(), leaf.der().as_ref());
        assert!(issuer.is_empty());
    }

    #[test]
    fn test_split_chain_without_certificates() {
        let err = split_chain("example.com", "").unwrap_err();
        assert!(matches!(err, CertKeeperError::Issuance { .. }));

        let err = split_chain("example.com", "-----BEGIN CERTIFICATE-----\ntruncated").unwrap_err();
        assert!(matches!(err, CertKeeperError::Issuance { .. }));
    }

    #[test]
    fn test_split_chain_rejects_corrupt_blocks() {
        let not_der = "-----BEGIN CERTIFICATE-----\nTEVBRg==\n-----END CERTIFICATE-----\n";
        let err = split_chain("example.com", not_der).unwrap_err();
        assert!(err.to_string().contains("not an X.509 certificate"));

        let bad_base64 = "-----BEGIN CERTIFICATE-----\n!!!!\n-----END CERTIFICATE-----\n";
        assert!(split_chain("example.com", bad_base64).is_err());

        let key = KeyPair::generate().unwrap().serialize_pem();
        let chain = format!("{}{}", certificate("example.com").pem(), key);
        let err = split_chain("example.com", &chain).unwrap_err();
        assert!(err.to_string().contains("PRIVATE KEY"));
    }
}
