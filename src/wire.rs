//! JSON wire format for credentials, certificates, proofs, and requests
//!
//! Formulas travel in their canonical encoding, sequents likewise, public
//! keys as hex of their PEM SubjectPublicKeyInfo form, signatures as hex.
//! Wire structs declare fields in alphabetical order so serialized keys
//! come out sorted. Decoding re-parses every embedded string and resolves
//! rule names against the catalog, so malformed input is rejected here and
//! never reaches the core.

#![forbid(unsafe_code)]
#![allow(missing_docs)]

use serde::{Deserialize, Serialize};

use crate::crypto::{public_key_from_pem, public_key_to_pem, Certificate, Credential};
use crate::logic::{Agent, Premise, Proof};
use crate::parse::{parse_formula, parse_sequent, ParseError};
use crate::request::AccessRequest;
use crate::rules::calculus;

#[derive(Debug, thiserror::Error)]
pub enum WireError {
    #[error("json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("bad formula in `{field}`: {err}")]
    Formula { field: &'static str, err: ParseError },
    #[error("bad sequent in proof node: {0}")]
    Sequent(ParseError),
    #[error("unknown rule name `{0}`")]
    UnknownRule(String),
    #[error("bad public key encoding: {0}")]
    PublicKey(String),
    #[error("a proof with open obligations cannot be serialized")]
    OpenPremise,
}

// ============================================================================
// Wire shapes (fields in alphabetical order: serialized keys are sorted)
// ============================================================================

#[derive(Serialize, Deserialize)]
struct CredentialWire {
    p: String,
    signator: String,
    signature: String,
}

#[derive(Serialize, Deserialize)]
struct CertificateWire {
    agent: String,
    cred: CredentialWire,
    public_key: String,
}

#[derive(Serialize, Deserialize)]
struct ProofWire {
    conclusion: String,
    premises: Vec<ProofWire>,
    rule: String,
}

#[derive(Serialize, Deserialize)]
struct AccessRequestWire {
    certs: Vec<CertificateWire>,
    creds: Vec<CredentialWire>,
    proof: ProofWire,
    signature: CredentialWire,
}

// ============================================================================
// Credential
// ============================================================================

fn credential_to_wire(cred: &Credential) -> CredentialWire {
    CredentialWire {
        p: cred.statement.to_string(),
        signator: cred.signator.0.clone(),
        signature: cred.signature.clone(),
    }
}

fn credential_from_wire(wire: CredentialWire) -> Result<Credential, WireError> {
    Ok(Credential {
        statement: parse_formula(&wire.p)
            .map_err(|err| WireError::Formula { field: "p", err })?,
        signator: Agent(wire.signator),
        signature: wire.signature,
    })
}

pub fn credential_to_json(cred: &Credential) -> String {
    serde_json::to_string_pretty(&credential_to_wire(cred)).expect("serialize credential")
}

pub fn credential_from_json(json: &str) -> Result<Credential, WireError> {
    credential_from_wire(serde_json::from_str(json)?)
}

// ============================================================================
// Certificate
// ============================================================================

fn certificate_to_wire(cert: &Certificate) -> Result<CertificateWire, WireError> {
    let pem = public_key_to_pem(&cert.public_key)
        .map_err(|e| WireError::PublicKey(e.to_string()))?;
    Ok(CertificateWire {
        agent: cert.subject.0.clone(),
        cred: credential_to_wire(&cert.cred),
        public_key: hex::encode(pem.as_bytes()),
    })
}

fn certificate_from_wire(wire: CertificateWire) -> Result<Certificate, WireError> {
    let pem_bytes =
        hex::decode(&wire.public_key).map_err(|e| WireError::PublicKey(e.to_string()))?;
    let pem =
        String::from_utf8(pem_bytes).map_err(|e| WireError::PublicKey(e.to_string()))?;
    let public_key =
        public_key_from_pem(&pem).map_err(|e| WireError::PublicKey(e.to_string()))?;
    Ok(Certificate {
        public_key,
        subject: Agent(wire.agent),
        cred: credential_from_wire(wire.cred)?,
    })
}

pub fn certificate_to_json(cert: &Certificate) -> Result<String, WireError> {
    Ok(serde_json::to_string_pretty(&certificate_to_wire(cert)?)
        .expect("serialize certificate"))
}

pub fn certificate_from_json(json: &str) -> Result<Certificate, WireError> {
    certificate_from_wire(serde_json::from_str(json)?)
}

// ============================================================================
// Proof trees and access requests
// ============================================================================

fn proof_to_wire(pf: &Proof) -> Result<ProofWire, WireError> {
    let mut premises = Vec::with_capacity(pf.premises.len());
    for prem in &pf.premises {
        match prem {
            Premise::Proved(sub) => premises.push(proof_to_wire(sub)?),
            Premise::Open(_) => return Err(WireError::OpenPremise),
        }
    }
    Ok(ProofWire {
        conclusion: pf.conclusion.to_string(),
        premises,
        rule: pf.rule.name.to_string(),
    })
}

fn proof_from_wire(wire: ProofWire) -> Result<Proof, WireError> {
    let rule = calculus()
        .get(wire.rule.as_str())
        .copied()
        .ok_or(WireError::UnknownRule(wire.rule))?;
    let conclusion = parse_sequent(&wire.conclusion).map_err(WireError::Sequent)?;
    let premises = wire
        .premises
        .into_iter()
        .map(|p| proof_from_wire(p).map(Premise::Proved))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Proof::new(premises, conclusion, rule))
}

pub fn request_to_json(req: &AccessRequest) -> Result<String, WireError> {
    let wire = AccessRequestWire {
        certs: req
            .certs
            .iter()
            .map(certificate_to_wire)
            .collect::<Result<Vec<_>, _>>()?,
        creds: req.creds.iter().map(credential_to_wire).collect(),
        proof: proof_to_wire(&req.proof)?,
        signature: credential_to_wire(&req.signature),
    };
    Ok(serde_json::to_string_pretty(&wire).expect("serialize access request"))
}

pub fn request_from_json(json: &str) -> Result<AccessRequest, WireError> {
    let wire: AccessRequestWire = serde_json::from_str(json)?;
    Ok(AccessRequest {
        proof: proof_from_wire(wire.proof)?,
        signature: credential_from_wire(wire.signature)?,
        creds: wire
            .creds
            .into_iter()
            .map(credential_from_wire)
            .collect::<Result<Vec<_>, _>>()?,
        certs: wire
            .certs
            .into_iter()
            .map(certificate_from_wire)
            .collect::<Result<Vec<_>, _>>()?,
    })
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::{generate_signing_key, Certificate};
    use crate::logic::{Formula, Judgement, Sequent};
    use crate::rules::IDENTITY;

    fn agent(id: &str) -> Agent {
        Agent(id.to_string())
    }

    #[test]
    fn credential_round_trips_and_keys_are_sorted() {
        let sk = generate_signing_key();
        let cred = Credential::sign(
            Formula::open(Formula::agent("#b"), Formula::resource("<r>")),
            agent("#a"),
            &sk,
        );
        let json = credential_to_json(&cred);
        let p = json.find("\"p\"").unwrap();
        let signator = json.find("\"signator\"").unwrap();
        let signature = json.find("\"signature\"").unwrap();
        assert!(p < signator && signator < signature);
        assert_eq!(credential_from_json(&json).unwrap(), cred);
        // The signature still verifies after the round trip.
        assert!(credential_from_json(&json)
            .unwrap()
            .verify_signature(&sk.verifying_key()));
    }

    #[test]
    fn certificate_round_trips() {
        let sk = generate_signing_key();
        let cert =
            Certificate::make_for_key(sk.verifying_key(), agent("#ca"), agent("#ca"), &sk);
        let json = certificate_to_json(&cert).unwrap();
        assert_eq!(certificate_from_json(&json).unwrap(), cert);
    }

    #[test]
    fn malformed_credential_formula_is_rejected() {
        let json = r##"{"p": "open(#b", "signator": "#a", "signature": "00"}"##;
        assert!(matches!(
            credential_from_json(json),
            Err(WireError::Formula { .. })
        ));
    }

    #[test]
    fn proof_round_trips_through_wire() {
        let seq = Sequent::new(
            vec![Judgement::truth(Formula::open(
                Formula::agent("#b"),
                Formula::resource("<r>"),
            ))],
            Judgement::truth(Formula::open(
                Formula::agent("#b"),
                Formula::resource("<r>"),
            )),
        );
        let pf = Proof::new(vec![], seq, &IDENTITY);
        let wire = proof_to_wire(&pf).unwrap();
        let back = proof_from_wire(wire).unwrap();
        assert_eq!(back, pf);
    }

    #[test]
    fn unknown_rule_name_is_rejected() {
        let wire = ProofWire {
            conclusion: " |- true true".to_string(),
            premises: vec![],
            rule: "frobnicate".to_string(),
        };
        assert!(matches!(
            proof_from_wire(wire),
            Err(WireError::UnknownRule(_))
        ));
    }

    #[test]
    fn open_premises_do_not_serialize() {
        let seq = Sequent::new(vec![], Judgement::truth(Formula::truth()));
        let pf = Proof::new(
            vec![Premise::Open(seq.clone())],
            seq,
            &crate::rules::WEAKEN,
        );
        assert!(matches!(proof_to_wire(&pf), Err(WireError::OpenPremise)));
    }
}
