//! OCSP request encoding and response verification (RFC 6960).

use ring::digest;
use ring::signature::{self, UnparsedPublicKey, VerificationAlgorithm};
use simple_asn1::{oid, to_der, ASN1Block, ASN1Class, ASN1DecodeErr, BigInt, BigUint, OID};
use x509_parser::certificate::X509Certificate;

/// ENUMERATED is not decoded natively and surfaces as an unknown universal block
const TAG_ENUMERATED: u8 = 10;

/// Uncompressed P-384 point length; P-256 points are 65 bytes
const P384_POINT_LEN: usize = 97;

#[derive(Debug, thiserror::Error)]
pub enum OcspError {
    #[error("failed to encode OCSP request: {0}")]
    Encode(String),

    #[error("malformed OCSP response: {0}")]
    Decode(#[from] ASN1DecodeErr),

    #[error("malformed OCSP response: {0}")]
    Malformed(&'static str),

    #[error("OCSP responder returned status {status} ({name})")]
    Unsuccessful { status: u32, name: &'static str },

    #[error("OCSP response carries no response bytes")]
    MissingResponseBytes,

    #[error("unsupported OCSP response type")]
    UnsupportedResponseType,

    #[error("OCSP signature invalid: {0}")]
    Signature(String),

    #[error("OCSP response does not cover the requested certificate")]
    NoMatchingResponse,

    #[error("unrecognised certificate status")]
    UnknownStatusTag,
}

/// Certificate status reported by the responder
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CertStatus {
    Good,
    Revoked,
    Unknown,
}

/// An encoded request together with the CertID it asks about
#[derive(Debug, Clone)]
pub struct OcspRequest {
    pub der: Vec<u8>,
    issuer_name_hash: Vec<u8>,
    issuer_key_hash: Vec<u8>,
    serial: BigInt,
}

fn sha1(data: &[u8]) -> Vec<u8> {
    digest::digest(&digest::SHA1_FOR_LEGACY_USE_ONLY, data).as_ref().to_vec()
}

fn is_tag(tag: &BigUint, number: u8) -> bool {
    *tag == BigUint::from(number)
}

fn ocsp_basic_oid() -> OID {
    oid!(1, 3, 6, 1, 5, 5, 7, 48, 1, 1)
}

fn sha1_oid() -> OID {
    oid!(1, 3, 14, 3, 2, 26)
}

/// Build a single-certificate request with a SHA-1 CertID.
pub fn build_request(
    cert: &X509Certificate<'_>,
    issuer: &X509Certificate<'_>,
) -> Result<OcspRequest, OcspError> {
    let issuer_name_hash = sha1(issuer.subject().as_raw());
    let issuer_key_hash = sha1(issuer.public_key().subject_public_key.data.as_ref());
    let serial = BigInt::from(BigUint::from_bytes_be(cert.raw_serial()));

    let cert_id = ASN1Block::Sequence(
        0,
        vec![
            ASN1Block::Sequence(0, vec![ASN1Block::ObjectIdentifier(0, sha1_oid()), ASN1Block::Null(0)]),
            ASN1Block::OctetString(0, issuer_name_hash.clone()),
            ASN1Block::OctetString(0, issuer_key_hash.clone()),
            ASN1Block::Integer(0, serial.clone()),
        ],
    );

    // OCSPRequest { TBSRequest { requestList { Request { CertID } } } }
    let request = ASN1Block::Sequence(
        0,
        vec![ASN1Block::Sequence(
            0,
            vec![ASN1Block::Sequence(0, vec![ASN1Block::Sequence(0, vec![cert_id])])],
        )],
    );

    let der = to_der(&request).map_err(|e| OcspError::Encode(format!("{:?}", e)))?;

    Ok(OcspRequest { der, issuer_name_hash, issuer_key_hash, serial })
}

fn response_status_name(status: u32) -> &'static str {
    match status {
        1 => "malformedRequest",
        2 => "internalError",
        3 => "tryLater",
        5 => "sigRequired",
        6 => "unauthorized",
        _ => "unknown",
    }
}

/// Decode exactly one top-level SEQUENCE.
fn single_sequence(der: &[u8], what: &'static str) -> Result<(usize, Vec<ASN1Block>), OcspError> {
    let mut blocks = simple_asn1::from_der(der)?;
    match (blocks.pop(), blocks.is_empty()) {
        (Some(ASN1Block::Sequence(offset, items)), true) => Ok((offset, items)),
        _ => Err(OcspError::Malformed(what)),
    }
}

fn response_status(block: Option<&ASN1Block>) -> Result<u32, OcspError> {
    match block {
        Some(ASN1Block::Unknown(ASN1Class::Universal, false, _, tag, body))
            if is_tag(tag, TAG_ENUMERATED) && !body.is_empty() && body.len() <= 4 =>
        {
            Ok(body.iter().fold(0u32, |acc, b| (acc << 8) | u32::from(*b)))
        }
        _ => Err(OcspError::Malformed("responseStatus")),
    }
}

/// Decode and verify a response, returning the status of the requested certificate.
///
/// The response must be signed by `issuer` or by a responder certificate
/// that `issuer` signed for OCSP signing.
pub fn parse_response(
    der: &[u8],
    request: &OcspRequest,
    issuer: &X509Certificate<'_>,
) -> Result<CertStatus, OcspError> {
    let (_, fields) = single_sequence(der, "OCSPResponse")?;

    let status = response_status(fields.first())?;
    if status != 0 {
        return Err(OcspError::Unsuccessful { status, name: response_status_name(status) });
    }

    let response_bytes = match fields.get(1) {
        Some(ASN1Block::Explicit(ASN1Class::ContextSpecific, _, tag, inner)) if is_tag(tag, 0) => {
            inner.as_ref()
        }
        _ => return Err(OcspError::MissingResponseBytes),
    };
    let basic_der = match response_bytes {
        ASN1Block::Sequence(_, rb) => match rb.as_slice() {
            [ASN1Block::ObjectIdentifier(_, kind), ASN1Block::OctetString(_, body)] => {
                if *kind != ocsp_basic_oid() {
                    return Err(OcspError::UnsupportedResponseType);
                }
                body
            }
            _ => return Err(OcspError::Malformed("responseBytes")),
        },
        _ => return Err(OcspError::Malformed("responseBytes")),
    };

    let (_, parts) = single_sequence(basic_der, "BasicOCSPResponse")?;
    let (tbs_offset, tbs) = match parts.first() {
        Some(ASN1Block::Sequence(offset, items)) => (*offset, items),
        _ => return Err(OcspError::Malformed("tbsResponseData")),
    };
    let (sig_alg_offset, sig_alg_oid) = match parts.get(1) {
        Some(ASN1Block::Sequence(offset, items)) => match items.first() {
            Some(ASN1Block::ObjectIdentifier(_, oid)) => (*offset, oid),
            _ => return Err(OcspError::Malformed("signatureAlgorithm")),
        },
        _ => return Err(OcspError::Malformed("signatureAlgorithm")),
    };
    let signature = match parts.get(2) {
        Some(ASN1Block::BitString(_, bits, bytes)) if *bits == bytes.len() * 8 => bytes,
        _ => return Err(OcspError::Malformed("signature")),
    };
    let responder_offset = match parts.get(3) {
        Some(ASN1Block::Explicit(ASN1Class::ContextSpecific, _, tag, certs)) if is_tag(tag, 0) => {
            match certs.as_ref() {
                ASN1Block::Sequence(_, list) => list.first().map(block_offset),
                _ => return Err(OcspError::Malformed("certs")),
            }
        }
        _ => None,
    };

    // tbsResponseData ends where signatureAlgorithm starts.
    let signed = basic_der
        .get(tbs_offset..sig_alg_offset)
        .ok_or(OcspError::Malformed("tbsResponseData"))?;
    let responder_der = match responder_offset {
        Some(offset) => Some(basic_der.get(offset..).ok_or(OcspError::Malformed("certs"))?),
        None => None,
    };

    verify_signature(signed, sig_alg_oid, signature, responder_der, issuer)?;
    find_status(tbs, request)
}

fn block_offset(block: &ASN1Block) -> usize {
    match block {
        ASN1Block::Boolean(o, _)
        | ASN1Block::Integer(o, _)
        | ASN1Block::BitString(o, _, _)
        | ASN1Block::OctetString(o, _)
        | ASN1Block::Null(o)
        | ASN1Block::ObjectIdentifier(o, _)
        | ASN1Block::UTF8String(o, _)
        | ASN1Block::PrintableString(o, _)
        | ASN1Block::TeletexString(o, _)
        | ASN1Block::IA5String(o, _)
        | ASN1Block::UTCTime(o, _)
        | ASN1Block::GeneralizedTime(o, _)
        | ASN1Block::UniversalString(o, _)
        | ASN1Block::BMPString(o, _)
        | ASN1Block::Sequence(o, _)
        | ASN1Block::Set(o, _)
        | ASN1Block::Explicit(_, o, _, _)
        | ASN1Block::Unknown(_, _, o, _, _) => *o,
    }
}

/// `responder_der` starts at the first embedded certificate and may run past it.
fn verify_signature(
    signed: &[u8],
    sig_alg_oid: &OID,
    signature: &[u8],
    responder_der: Option<&[u8]>,
    issuer: &X509Certificate<'_>,
) -> Result<(), OcspError> {
    let mut signer_key = issuer.public_key().subject_public_key.data.to_vec();
    if let Some(raw) = responder_der {
        let (_, responder) = x509_parser::parse_x509_certificate(raw)
            .map_err(|e| OcspError::Signature(format!("bad responder certificate: {}", e)))?;

        if responder.public_key().raw != issuer.public_key().raw {
            responder.verify_signature(Some(issuer.public_key())).map_err(|e| {
                OcspError::Signature(format!("responder certificate not signed by issuer: {}", e))
            })?;
            let authorized = matches!(
                responder.extended_key_usage(),
                Ok(Some(eku)) if eku.value.ocsp_signing
            );
            if !authorized {
                return Err(OcspError::Signature(
                    "responder certificate lacks the OCSP signing usage".to_string(),
                ));
            }
            signer_key = responder.public_key().subject_public_key.data.to_vec();
        }
    }

    let algorithm = verification_algorithm(sig_alg_oid, signer_key.len())?;
    UnparsedPublicKey::new(algorithm, &signer_key)
        .verify(signed, signature)
        .map_err(|_| OcspError::Signature("signature does not match responder key".to_string()))
}

fn verification_algorithm(
    alg: &OID,
    key_len: usize,
) -> Result<&'static dyn VerificationAlgorithm, OcspError> {
    let p384 = key_len == P384_POINT_LEN;
    let algorithm: &'static dyn VerificationAlgorithm =
        if *alg == oid!(1, 2, 840, 113549, 1, 1, 11) {
            &signature::RSA_PKCS1_2048_8192_SHA256
        } else if *alg == oid!(1, 2, 840, 113549, 1, 1, 12) {
            &signature::RSA_PKCS1_2048_8192_SHA384
        } else if *alg == oid!(1, 2, 840, 113549, 1, 1, 13) {
            &signature::RSA_PKCS1_2048_8192_SHA512
        } else if *alg == oid!(1, 2, 840, 113549, 1, 1, 5) {
            &signature::RSA_PKCS1_2048_8192_SHA1_FOR_LEGACY_USE_ONLY
        } else if *alg == oid!(1, 2, 840, 10045, 4, 3, 2) {
            if p384 {
                &signature::ECDSA_P384_SHA256_ASN1
            } else {
                &signature::ECDSA_P256_SHA256_ASN1
            }
        } else if *alg == oid!(1, 2, 840, 10045, 4, 3, 3) {
            if p384 {
                &signature::ECDSA_P384_SHA384_ASN1
            } else {
                &signature::ECDSA_P256_SHA384_ASN1
            }
        } else if *alg == oid!(1, 3, 101, 112) {
            &signature::ED25519
        } else {
            return Err(OcspError::Signature("unsupported signature algorithm".to_string()));
        };
    Ok(algorithm)
}

/// Walk ResponseData to the SingleResponse matching the request's CertID.
fn find_status(tbs: &[ASN1Block], request: &OcspRequest) -> Result<CertStatus, OcspError> {
    let mut fields = tbs.iter().peekable();
    // Optional explicit version [0]
    if matches!(
        fields.peek(),
        Some(ASN1Block::Explicit(ASN1Class::ContextSpecific, _, tag, _)) if is_tag(tag, 0)
    ) {
        fields.next();
    }
    match fields.next() {
        Some(ASN1Block::Explicit(ASN1Class::ContextSpecific, _, tag, _))
            if is_tag(tag, 1) || is_tag(tag, 2) => {}
        _ => return Err(OcspError::Malformed("responderID")),
    }
    if !matches!(fields.next(), Some(ASN1Block::GeneralizedTime(..))) {
        return Err(OcspError::Malformed("producedAt"));
    }
    let responses = match fields.next() {
        Some(ASN1Block::Sequence(_, responses)) => responses,
        _ => return Err(OcspError::Malformed("responses")),
    };

    for single in responses {
        let parts = match single {
            ASN1Block::Sequence(_, parts) => parts,
            _ => return Err(OcspError::Malformed("SingleResponse")),
        };
        let cert_id = match parts.first() {
            Some(ASN1Block::Sequence(_, cert_id)) => cert_id,
            _ => return Err(OcspError::Malformed("certID")),
        };
        if !cert_id_matches(cert_id, request)? {
            continue;
        }
        return cert_status(parts.get(1));
    }

    Err(OcspError::NoMatchingResponse)
}

fn cert_status(block: Option<&ASN1Block>) -> Result<CertStatus, OcspError> {
    let tag = match block {
        Some(ASN1Block::Explicit(ASN1Class::ContextSpecific, _, tag, _))
        | Some(ASN1Block::Unknown(ASN1Class::ContextSpecific, _, _, tag, _)) => tag,
        Some(_) => return Err(OcspError::UnknownStatusTag),
        None => return Err(OcspError::Malformed("certStatus")),
    };
    if is_tag(tag, 0) {
        Ok(CertStatus::Good)
    } else if is_tag(tag, 1) {
        Ok(CertStatus::Revoked)
    } else if is_tag(tag, 2) {
        Ok(CertStatus::Unknown)
    } else {
        Err(OcspError::UnknownStatusTag)
    }
}

fn cert_id_matches(cert_id: &[ASN1Block], request: &OcspRequest) -> Result<bool, OcspError> {
    match cert_id {
        [ASN1Block::Sequence(_, alg), ASN1Block::OctetString(_, name_hash), ASN1Block::OctetString(_, key_hash), ASN1Block::Integer(_, serial)] =>
        {
            if *serial != request.serial {
                return Ok(false);
            }
            match alg.first() {
                Some(ASN1Block::ObjectIdentifier(_, hash)) if *hash == sha1_oid() => Ok(
                    *name_hash == request.issuer_name_hash && *key_hash == request.issuer_key_hash,
                ),
                Some(ASN1Block::ObjectIdentifier(..)) => Ok(true),
                _ => Err(OcspError::Malformed("hashAlgorithm")),
            }
        }
        _ => Err(OcspError::Malformed("certID")),
    }
}
