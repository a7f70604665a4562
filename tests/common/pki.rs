//! Throwaway CA, leaf certificates and signed OCSP responses.

use rcgen::{
    BasicConstraints, CertificateParams, CustomExtension, DistinguishedName, DnType,
    ExtendedKeyUsagePurpose, IsCa, KeyPair, SerialNumber,
};
use ring::digest;
use ring::rand::SystemRandom;
use ring::signature::{EcdsaKeyPair, ECDSA_P256_SHA256_ASN1_SIGNING};
use simple_asn1::{oid, to_der, ASN1Block, ASN1Class, BigInt, BigUint};

const GENERALIZED_TIME: &[u8] = b"20240101000000Z";

/// Status the fake responder reports
#[derive(Debug, Clone, Copy)]
pub enum OcspStatus {
    Good,
    Revoked,
    Unknown,
}

pub struct IssuedLeaf {
    pub pem: String,
    pub serial: Vec<u8>,
}

/// A responder certificate and key used to sign on the CA's behalf
pub struct Responder {
    pub key: KeyPair,
    pub der: Vec<u8>,
}

pub struct TestPki {
    pub ca_key: KeyPair,
    pub ca_cert: rcgen::Certificate,
}

/// Encode one DER element from a tag and content
pub fn der_tlv(tag: u8, content: &[u8]) -> Vec<u8> {
    let mut out = vec![tag];
    let len = content.len();
    if len < 0x80 {
        out.push(len as u8);
    } else {
        let bytes: Vec<u8> = len.to_be_bytes().iter().copied().skip_while(|b| *b == 0).collect();
        out.push(0x80 | bytes.len() as u8);
        out.extend(bytes);
    }
    out.extend_from_slice(content);
    out
}

fn generalized_time() -> ASN1Block {
    ASN1Block::Unknown(ASN1Class::Universal, false, 0, BigUint::from(24u8), GENERALIZED_TIME.to_vec())
}

fn enumerated(value: u8) -> ASN1Block {
    ASN1Block::Unknown(ASN1Class::Universal, false, 0, BigUint::from(10u8), vec![value])
}

/// An OCSPResponse carrying only a non-successful status
pub fn unsuccessful_response(status: u8) -> Vec<u8> {
    to_der(&ASN1Block::Sequence(0, vec![enumerated(status)])).unwrap()
}

/// Authority Information Access extension value naming an OCSP responder
fn aia_extension(ocsp_url: &str) -> Vec<u8> {
    let location = ASN1Block::Unknown(
        ASN1Class::ContextSpecific,
        false,
        0,
        BigUint::from(6u8),
        ocsp_url.as_bytes().to_vec(),
    );
    let access = ASN1Block::Sequence(
        0,
        vec![ASN1Block::ObjectIdentifier(0, oid!(1, 3, 6, 1, 5, 5, 7, 48, 1)), location],
    );
    to_der(&ASN1Block::Sequence(0, vec![access])).unwrap()
}

fn sha1(data: &[u8]) -> Vec<u8> {
    digest::digest(&digest::SHA1_FOR_LEGACY_USE_ONLY, data).as_ref().to_vec()
}

fn sign(key: &KeyPair, message: &[u8]) -> Vec<u8> {
    let rng = SystemRandom::new();
    let signer =
        EcdsaKeyPair::from_pkcs8(&ECDSA_P256_SHA256_ASN1_SIGNING, &key.serialize_der(), &rng)
            .unwrap();
    signer.sign(&rng, message).unwrap().as_ref().to_vec()
}

impl TestPki {
    pub fn new() -> Self {
        let ca_key = KeyPair::generate().unwrap();
        let mut params = CertificateParams::new(Vec::<String>::new()).unwrap();
        let mut name = DistinguishedName::new();
        name.push(DnType::CommonName, "certkeeper test CA");
        params.distinguished_name = name;
        params.is_ca = IsCa::Ca(BasicConstraints::Unconstrained);
        let ca_cert = params.self_signed(&ca_key).unwrap();
        Self { ca_key, ca_cert }
    }

    pub fn ca_pem(&self) -> String {
        self.ca_cert.pem()
    }

    /// Leaf for `domain`, with an AIA OCSP pointer when `ocsp_url` is given
    pub fn leaf(&self, domain: &str, ocsp_url: Option<&str>) -> IssuedLeaf {
        let serial = vec![0x1C, 0x2D, 0x3E, 0x4F];
        let key = KeyPair::generate().unwrap();
        let mut params = CertificateParams::new(vec![domain.to_string()]).unwrap();
        params.serial_number = Some(SerialNumber::from_slice(&serial));
        if let Some(url) = ocsp_url {
            params.custom_extensions.push(CustomExtension::from_oid_content(
                &[1, 3, 6, 1, 5, 5, 7, 1, 1],
                aia_extension(url),
            ));
        }
        let cert = params.signed_by(&key, &self.ca_cert, &self.ca_key).unwrap();
        IssuedLeaf { pem: cert.pem(), serial }
    }

    /// Responder certificate signed by the CA, optionally with the OCSP-signing usage
    pub fn responder(&self, ocsp_signing: bool) -> Responder {
        let key = KeyPair::generate().unwrap();
        let mut params = CertificateParams::new(Vec::<String>::new()).unwrap();
        let mut name = DistinguishedName::new();
        name.push(DnType::CommonName, "certkeeper test OCSP responder");
        params.distinguished_name = name;
        if ocsp_signing {
            params.extended_key_usages = vec![ExtendedKeyUsagePurpose::OcspSigning];
        }
        let cert = params.signed_by(&key, &self.ca_cert, &self.ca_key).unwrap();
        Responder { key, der: cert.der().to_vec() }
    }

    fn cert_id(&self, serial: &[u8]) -> ASN1Block {
        let (_, ca) = x509_parser::parse_x509_certificate(self.ca_cert.der()).unwrap();
        let name_hash = sha1(ca.subject().as_raw());
        let key_hash = sha1(ca.public_key().subject_public_key.data.as_ref());

        ASN1Block::Sequence(
            0,
            vec![
                ASN1Block::Sequence(
                    0,
                    vec![ASN1Block::ObjectIdentifier(0, oid!(1, 3, 14, 3, 2, 26)), ASN1Block::Null(0)],
                ),
                ASN1Block::OctetString(0, name_hash),
                ASN1Block::OctetString(0, key_hash),
                ASN1Block::Integer(0, BigInt::from(BigUint::from_bytes_be(serial))),
            ],
        )
    }

    fn tbs_response_data(&self, serial: &[u8], status: OcspStatus) -> Vec<u8> {
        let cert_status = match status {
            OcspStatus::Good => {
                ASN1Block::Unknown(ASN1Class::ContextSpecific, false, 0, BigUint::from(0u8), vec![])
            }
            OcspStatus::Revoked => ASN1Block::Unknown(
                ASN1Class::ContextSpecific,
                true,
                0,
                BigUint::from(1u8),
                to_der(&generalized_time()).unwrap(),
            ),
            OcspStatus::Unknown => {
                ASN1Block::Unknown(ASN1Class::ContextSpecific, false, 0, BigUint::from(2u8), vec![])
            }
        };

        let single = ASN1Block::Sequence(
            0,
            vec![self.cert_id(serial), cert_status, generalized_time()],
        );
        let responder_id = ASN1Block::Explicit(
            ASN1Class::ContextSpecific,
            0,
            BigUint::from(2u8),
            Box::new(ASN1Block::OctetString(0, vec![0xAB; 20])),
        );

        to_der(&ASN1Block::Sequence(
            0,
            vec![responder_id, generalized_time(), ASN1Block::Sequence(0, vec![single])],
        ))
        .unwrap()
    }

    fn wrap(&self, tbs: Vec<u8>, signature: Vec<u8>, certs: Option<&[u8]>) -> Vec<u8> {
        let sig_alg = to_der(&ASN1Block::Sequence(
            0,
            vec![ASN1Block::ObjectIdentifier(0, oid!(1, 2, 840, 10045, 4, 3, 2))],
        ))
        .unwrap();
        let sig_bits = to_der(&ASN1Block::BitString(0, signature.len() * 8, signature)).unwrap();

        let mut basic_content = tbs;
        basic_content.extend(sig_alg);
        basic_content.extend(sig_bits);
        if let Some(cert) = certs {
            basic_content.extend(der_tlv(0xA0, &der_tlv(0x30, cert)));
        }
        let basic = der_tlv(0x30, &basic_content);

        let response_bytes = to_der(&ASN1Block::Sequence(
            0,
            vec![
                ASN1Block::ObjectIdentifier(0, oid!(1, 3, 6, 1, 5, 5, 7, 48, 1, 1)),
                ASN1Block::OctetString(0, basic),
            ],
        ))
        .unwrap();

        let mut outer = to_der(&enumerated(0)).unwrap();
        outer.extend(der_tlv(0xA0, &response_bytes));
        der_tlv(0x30, &outer)
    }

    /// Successful response signed directly by the CA key
    pub fn ocsp_response(&self, serial: &[u8], status: OcspStatus) -> Vec<u8> {
        let tbs = self.tbs_response_data(serial, status);
        let signature = sign(&self.ca_key, &tbs);
        self.wrap(tbs, signature, None)
    }

    /// Successful response signed by an unrelated key
    pub fn forged_ocsp_response(&self, serial: &[u8], status: OcspStatus) -> Vec<u8> {
        let tbs = self.tbs_response_data(serial, status);
        let signature = sign(&KeyPair::generate().unwrap(), &tbs);
        self.wrap(tbs, signature, None)
    }

    /// Successful response signed by a delegated responder that ships its certificate
    pub fn delegated_ocsp_response(
        &self,
        serial: &[u8],
        status: OcspStatus,
        responder: &Responder,
    ) -> Vec<u8> {
        let tbs = self.tbs_response_data(serial, status);
        let signature = sign(&responder.key, &tbs);
        self.wrap(tbs, signature, Some(&responder.der))
    }
}
