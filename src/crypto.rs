//! Credentials, certificates, and the Ed25519 binding
//!
//! A credential is a formula signed by a principal; the signature covers
//! the UTF-8 bytes of the formula's canonical encoding, so the logical and
//! cryptographic views of a statement can never drift apart. Certificates
//! bind public keys to principals via an `iskey` credential issued by a
//! certificate authority, and chains of them are validated back to a
//! trusted self-signed root.
//!
//! Private keys travel as PKCS#8 PEM, public keys as SubjectPublicKeyInfo
//! PEM; fingerprints are truncated BLAKE3 digests of the raw key bytes in
//! the bracketed, colon-separated form the logic quotes in `iskey`/`sign`
//! formulas.

#![forbid(unsafe_code)]
#![allow(missing_docs)]

use std::collections::{HashMap, HashSet};
use std::fmt;

use ed25519_dalek::pkcs8::spki::der::pem::LineEnding;
use ed25519_dalek::pkcs8::{DecodePrivateKey, DecodePublicKey, EncodePrivateKey, EncodePublicKey};
use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use rand::rngs::OsRng;

use crate::logic::{Agent, Formula, Operator};

#[derive(Debug, thiserror::Error)]
pub enum CryptoError {
    #[error("key encoding: {0}")]
    KeyEncoding(String),
}

/// Why a certificate chain fails to validate.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ChainError {
    #[error("certificate statement for {0} is not an iskey binding of its subject")]
    MalformedBinding(String),
    #[error("certificate for {0} does not bind the fingerprint of its own key")]
    FingerprintMismatch(String),
    #[error("issuer {issuer} of {subject}'s certificate is not in the chain")]
    MissingIssuer { subject: String, issuer: String },
    #[error("invalid signature on {0}'s certificate")]
    BadSignature(String),
    #[error("self-signed certificate for {0} is not a trusted root")]
    UntrustedRoot(String),
    #[error("certificate chain for {0} contains a cycle")]
    CyclicChain(String),
}

// ============================================================================
// Keys and fingerprints
// ============================================================================

/// Generate a fresh Ed25519 keypair from the OS entropy source.
pub fn generate_signing_key() -> SigningKey {
    SigningKey::generate(&mut OsRng)
}

/// Bracketed, colon-separated fingerprint of a public key, e.g.
/// `[ab:03:…:f1]`. Stable identifier quoted inside formulas.
pub fn fingerprint(key: &VerifyingKey) -> String {
    let digest = blake3::hash(key.as_bytes());
    let hexed = hex::encode(&digest.as_bytes()[..16]);
    let pairs: Vec<&str> = hexed
        .as_bytes()
        .chunks(2)
        .map(|c| std::str::from_utf8(c).unwrap_or(""))
        .collect();
    format!("[{}]", pairs.join(":"))
}

/// PEM (SubjectPublicKeyInfo) encoding of a public key.
pub fn public_key_to_pem(key: &VerifyingKey) -> Result<String, CryptoError> {
    key.to_public_key_pem(LineEnding::LF)
        .map_err(|e| CryptoError::KeyEncoding(e.to_string()))
}

pub fn public_key_from_pem(pem: &str) -> Result<VerifyingKey, CryptoError> {
    VerifyingKey::from_public_key_pem(pem).map_err(|e| CryptoError::KeyEncoding(e.to_string()))
}

/// PEM (PKCS#8) encoding of a private key.
pub fn signing_key_to_pem(key: &SigningKey) -> Result<String, CryptoError> {
    key.to_pkcs8_pem(LineEnding::LF)
        .map(|z| z.to_string())
        .map_err(|e| CryptoError::KeyEncoding(e.to_string()))
}

pub fn signing_key_from_pem(pem: &str) -> Result<SigningKey, CryptoError> {
    SigningKey::from_pkcs8_pem(pem).map_err(|e| CryptoError::KeyEncoding(e.to_string()))
}

// ============================================================================
// Credentials
// ============================================================================

/// A formula signed by a principal. `signature` is the hex encoding of an
/// Ed25519 signature over the canonical encoding of `statement`.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Credential {
    pub statement: Formula,
    pub signator: Agent,
    pub signature: String,
}

impl Credential {
    /// Sign `statement` with `signator`'s private key.
    pub fn sign(statement: Formula, signator: Agent, key: &SigningKey) -> Credential {
        let message = statement.to_string();
        let sig = key.sign(message.as_bytes());
        Credential {
            statement,
            signator,
            signature: hex::encode(sig.to_bytes()),
        }
    }

    /// Check the signature against a public key. Any decoding failure is a
    /// verification failure, not an error.
    pub fn verify_signature(&self, public_key: &VerifyingKey) -> bool {
        let Ok(bytes) = hex::decode(&self.signature) else {
            return false;
        };
        let Ok(sig) = Signature::from_slice(&bytes) else {
            return false;
        };
        public_key
            .verify(self.statement.to_string().as_bytes(), &sig)
            .is_ok()
    }

    /// The credential as a `sign` formula, using the signator's certified
    /// key fingerprint: `sign(statement, [fp])`.
    pub fn sign_formula(&self, signator_cert: &Certificate) -> Formula {
        Formula::sign(
            self.statement.clone(),
            Formula::key(&fingerprint(&signator_cert.public_key)),
        )
    }
}

impl fmt::Display for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tail = if self.signature.len() > 16 {
            &self.signature[..16]
        } else {
            &self.signature
        };
        writeln!(f, "statement: {}", self.statement)?;
        writeln!(f, "signator:  {}", self.signator.0)?;
        write!(f, "signature: {tail}..")
    }
}

// ============================================================================
// Certificates
// ============================================================================

/// A public key bound to a principal by an `iskey` credential, typically
/// issued by a certificate authority. Self-signed certificates (subject ==
/// issuer) act as chain roots.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Certificate {
    pub public_key: VerifyingKey,
    pub subject: Agent,
    pub cred: Credential,
}

impl Certificate {
    /// Certify `public_key` as belonging to `subject`, with the binding
    /// credential signed by `signator`'s key.
    pub fn make_for_key(
        public_key: VerifyingKey,
        subject: Agent,
        signator: Agent,
        signing_key: &SigningKey,
    ) -> Certificate {
        let binding = Formula::iskey(
            Formula::Agent(subject.clone()),
            Formula::key(&fingerprint(&public_key)),
        );
        let cred = Credential::sign(binding, signator, signing_key);
        Certificate { public_key, subject, cred }
    }

    pub fn is_self_signed(&self) -> bool {
        self.subject == self.cred.signator
    }
}

impl fmt::Display for Certificate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "key:   {}", fingerprint(&self.public_key))?;
        writeln!(f, "agent: {}", self.subject.0)?;
        write!(f, "{}", self.cred)
    }
}

/// Validate `cert` by walking issuer certificates from `chain` until a
/// self-signed certificate is reached; that root must be in `roots`.
///
/// At every link the binding statement must be `iskey(subject, fp)` for
/// the certificate's own key, and the issuing credential's signature must
/// verify under the issuer's certified key.
pub fn verify_cert(
    cert: &Certificate,
    chain: &HashMap<Agent, Certificate>,
    roots: &[Certificate],
) -> Result<(), ChainError> {
    let mut current = cert;
    let mut seen: HashSet<Agent> = HashSet::new();
    loop {
        let expected = Formula::iskey(
            Formula::Agent(current.subject.clone()),
            Formula::key(&fingerprint(&current.public_key)),
        );
        match &current.cred.statement {
            Formula::App(Operator::IsKey, _) if current.cred.statement == expected => {}
            Formula::App(Operator::IsKey, _) => {
                return Err(ChainError::FingerprintMismatch(current.subject.0.clone()));
            }
            _ => return Err(ChainError::MalformedBinding(current.subject.0.clone())),
        }
        let issuer = chain
            .get(&current.cred.signator)
            .ok_or_else(|| ChainError::MissingIssuer {
                subject: current.subject.0.clone(),
                issuer: current.cred.signator.0.clone(),
            })?;
        if !current.cred.verify_signature(&issuer.public_key) {
            return Err(ChainError::BadSignature(current.subject.0.clone()));
        }
        if current.is_self_signed() {
            return if roots.contains(current) {
                Ok(())
            } else {
                Err(ChainError::UntrustedRoot(current.subject.0.clone()))
            };
        }
        if !seen.insert(current.subject.clone()) {
            return Err(ChainError::CyclicChain(cert.subject.0.clone()));
        }
        current = issuer;
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn agent(id: &str) -> Agent {
        Agent(id.to_string())
    }

    #[test]
    fn fingerprint_is_bracketed_colon_pairs() {
        let key = generate_signing_key();
        let fp = fingerprint(&key.verifying_key());
        assert!(fp.starts_with('[') && fp.ends_with(']'));
        let inner = &fp[1..fp.len() - 1];
        assert_eq!(inner.split(':').count(), 16);
        assert!(inner.split(':').all(|p| p.len() == 2));
    }

    #[test]
    fn pem_round_trips() {
        let sk = generate_signing_key();
        let sk2 = signing_key_from_pem(&signing_key_to_pem(&sk).unwrap()).unwrap();
        assert_eq!(sk.to_bytes(), sk2.to_bytes());
        let vk = sk.verifying_key();
        let vk2 = public_key_from_pem(&public_key_to_pem(&vk).unwrap()).unwrap();
        assert_eq!(vk, vk2);
    }

    #[test]
    fn credential_signature_verifies() {
        let sk = generate_signing_key();
        let grant = Formula::open(Formula::agent("#b"), Formula::resource("<r>"));
        let cred = Credential::sign(grant, agent("#a"), &sk);
        assert!(cred.verify_signature(&sk.verifying_key()));
        // Wrong key fails.
        let other = generate_signing_key();
        assert!(!cred.verify_signature(&other.verifying_key()));
    }

    #[test]
    fn tampered_statement_is_rejected() {
        // Scenario: a credential whose statement differs from what was
        // signed must fail verification.
        let sk = generate_signing_key();
        let cred = Credential::sign(
            Formula::open(Formula::agent("#b"), Formula::resource("<r>")),
            agent("#a"),
            &sk,
        );
        let tampered = Credential {
            statement: Formula::open(Formula::agent("#b"), Formula::resource("<s>")),
            ..cred
        };
        assert!(!tampered.verify_signature(&sk.verifying_key()));
    }

    #[test]
    fn garbage_signature_is_rejected_not_fatal() {
        let sk = generate_signing_key();
        let mut cred = Credential::sign(Formula::truth(), agent("#a"), &sk);
        cred.signature = "zz-not-hex".to_string();
        assert!(!cred.verify_signature(&sk.verifying_key()));
    }

    fn make_chain() -> (SigningKey, Certificate, SigningKey, Certificate) {
        let ca_key = generate_signing_key();
        let ca_cert = Certificate::make_for_key(
            ca_key.verifying_key(),
            agent("#ca"),
            agent("#ca"),
            &ca_key,
        );
        let alice_key = generate_signing_key();
        let alice_cert = Certificate::make_for_key(
            alice_key.verifying_key(),
            agent("#alice"),
            agent("#ca"),
            &ca_key,
        );
        (ca_key, ca_cert, alice_key, alice_cert)
    }

    #[test]
    fn chain_verifies_up_to_trusted_root() {
        let (_, ca_cert, _, alice_cert) = make_chain();
        let chain = HashMap::from([
            (agent("#ca"), ca_cert.clone()),
            (agent("#alice"), alice_cert.clone()),
        ]);
        let roots = vec![ca_cert];
        assert!(verify_cert(&alice_cert, &chain, &roots).is_ok());
    }

    #[test]
    fn untrusted_self_signer_is_rejected() {
        // Scenario: a certificate signed by a self-signer outside the
        // trusted root set must be rejected.
        let (_, ca_cert, _, _) = make_chain();
        let mallory_key = generate_signing_key();
        let mallory_cert = Certificate::make_for_key(
            mallory_key.verifying_key(),
            agent("#mallory"),
            agent("#mallory"),
            &mallory_key,
        );
        let chain = HashMap::from([(agent("#mallory"), mallory_cert.clone())]);
        let roots = vec![ca_cert];
        assert_eq!(
            verify_cert(&mallory_cert, &chain, &roots),
            Err(ChainError::UntrustedRoot("#mallory".to_string()))
        );
    }

    #[test]
    fn missing_issuer_is_rejected() {
        let (_, _, _, alice_cert) = make_chain();
        let chain = HashMap::from([(agent("#alice"), alice_cert.clone())]);
        assert!(matches!(
            verify_cert(&alice_cert, &chain, &[]),
            Err(ChainError::MissingIssuer { .. })
        ));
    }

    #[test]
    fn swapped_key_is_a_fingerprint_mismatch() {
        let (_, ca_cert, _, alice_cert) = make_chain();
        let other = generate_signing_key();
        let forged = Certificate {
            public_key: other.verifying_key(),
            ..alice_cert
        };
        let chain = HashMap::from([
            (agent("#ca"), ca_cert.clone()),
            (agent("#alice"), forged.clone()),
        ]);
        assert_eq!(
            verify_cert(&forged, &chain, &[ca_cert]),
            Err(ChainError::FingerprintMismatch("#alice".to_string()))
        );
    }

    #[test]
    fn bad_chain_signature_is_rejected() {
        let (_, ca_cert, _, alice_cert) = make_chain();
        let mallory_key = generate_signing_key();
        // Re-issue alice's binding under a key that is not the CA's.
        let forged = Certificate::make_for_key(
            alice_cert.public_key,
            agent("#alice"),
            agent("#ca"),
            &mallory_key,
        );
        let chain = HashMap::from([
            (agent("#ca"), ca_cert.clone()),
            (agent("#alice"), forged.clone()),
        ]);
        assert_eq!(
            verify_cert(&forged, &chain, &[ca_cert]),
            Err(ChainError::BadSignature("#alice".to_string()))
        );
    }

    #[test]
    fn sign_formula_quotes_the_issuer_fingerprint() {
        let (ca_key, ca_cert, _, _) = make_chain();
        let cred = Credential::sign(
            Formula::open(Formula::agent("#b"), Formula::resource("<r>")),
            agent("#ca"),
            &ca_key,
        );
        let f = cred.sign_formula(&ca_cert);
        let expected = Formula::sign(
            cred.statement.clone(),
            Formula::key(&fingerprint(&ca_cert.public_key)),
        );
        assert_eq!(f, expected);
    }
}
