//! Access requests: assembly on the client, verification on the server
//!
//! A request carries a proof of `A says open(B, R)`, the requester's
//! signature over that goal, and the credentials and certificates the
//! proof's assumptions depend on. Before shipping, the proof is rebased
//! onto the empty context: `sign` assumptions are stripped because the
//! server only re-admits them from evidence whose signatures it has
//! verified itself.
//!
//! Verification runs in three phases — certificate chains against the
//! trusted roots, credential signatures under the certified keys, then the
//! proof itself rebased onto the context reconstructed from that verified
//! evidence. Acceptance mints a fresh credential over the granted `open`
//! formula, signed with the issuer's key. Every failure is local to the
//! one request and reported as a typed rejection.

#![forbid(unsafe_code)]
#![allow(missing_docs)]

use std::collections::HashMap;

use ed25519_dalek::SigningKey;

use crate::context::get_cas;
use crate::crypto::{fingerprint, verify_cert, Certificate, ChainError, Credential};
use crate::logic::{Agent, Formula, Judgement, Operator, Premise, Proof, Sequent};
use crate::store::{EvidenceStore, StoreError};
use crate::verifier::verify;

/// Client-side assembly failures.
#[derive(Debug, thiserror::Error)]
pub enum RequestError {
    #[error("invalid access goal: {0}")]
    InvalidGoal(String),
    #[error("no credential found for {0}")]
    MissingCredential(String),
    #[error("could not find an authorization proof for {0}")]
    NoProof(String),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Server-side rejection reasons. Mapped to a boolean accept/reject plus
/// diagnostic text at the transport boundary.
#[derive(Debug, thiserror::Error)]
pub enum RejectError {
    #[error("certificate chain: {0}")]
    Chain(#[from] ChainError),
    #[error("no certificate accompanies credential signator {0}")]
    UnknownSignator(String),
    #[error("invalid signature on credential issued by {0}")]
    BadCredential(String),
    #[error("invalid request signature for {0}")]
    BadRequestSignature(String),
    #[error("no certificate accompanies certificate authority {0}")]
    UnknownCa(String),
    #[error("request goal is not an access grant: {0}")]
    InvalidGoal(String),
    #[error("request signature does not cover the proven goal: {0}")]
    GoalMismatch(String),
    #[error("proof does not verify, first open obligation: {0}")]
    OpenObligations(String),
}

// ============================================================================
// Rebasing
// ============================================================================

fn rebase_sequent(seq: &Sequent, gamma: &[Judgement]) -> Sequent {
    let mut out: Vec<Judgement> = Vec::with_capacity(seq.gamma.len() + gamma.len());
    for j in &seq.gamma {
        // Only `sign` assumptions are dropped: they are the ones that must
        // be re-admitted from verified credentials. Everything else was
        // derived inside the proof and is retained.
        let keep = match j.formula() {
            Formula::App(Operator::Sign, _) => gamma.contains(j),
            _ => true,
        };
        if keep && !out.contains(j) {
            out.push(j.clone());
        }
    }
    for j in gamma {
        if !out.contains(j) {
            out.push(j.clone());
        }
    }
    Sequent::new(out, seq.delta.clone())
}

/// Rewrite every sequent in the proof so its context is `gamma` (plus any
/// retained non-`sign` assumptions). With an empty `gamma` this strips the
/// proof for the wire; with a reconstructed context it prepares the proof
/// for verification.
pub fn rebase_proof(pf: &Proof, gamma: &[Judgement]) -> Proof {
    let premises = pf
        .premises
        .iter()
        .map(|prem| match prem {
            Premise::Proved(sub) => Premise::Proved(rebase_proof(sub, gamma)),
            Premise::Open(seq) => Premise::Open(rebase_sequent(seq, gamma)),
        })
        .collect();
    Proof::new(premises, rebase_sequent(&pf.conclusion, gamma), pf.rule)
}

// ============================================================================
// Evidence gathering
// ============================================================================

fn push_unique(out: &mut Vec<Formula>, f: Formula) {
    if !out.contains(&f) {
        out.push(f);
    }
}

fn credentials_in_formula(f: &Formula, out: &mut Vec<Formula>) {
    match f {
        Formula::App(Operator::Sign, _) => push_unique(out, f.clone()),
        Formula::App(_, args) => {
            for a in args {
                credentials_in_formula(a, out);
            }
        }
        _ => {}
    }
}

/// All `sign(P, [k])` formulas appearing in the goals of a proof's
/// sequents (conclusion and premises, recursively).
pub fn gather_credentials(pf: &Proof) -> Vec<Formula> {
    let mut out = Vec::new();
    fn walk(pf: &Proof, out: &mut Vec<Formula>) {
        credentials_in_formula(pf.conclusion.delta.formula(), out);
        for prem in &pf.premises {
            match prem {
                Premise::Proved(sub) => walk(sub, out),
                Premise::Open(seq) => credentials_in_formula(seq.delta.formula(), out),
            }
        }
    }
    walk(pf, &mut out);
    out
}

fn cas_in_formula(f: &Formula, out: &mut Vec<Formula>) {
    match f {
        Formula::App(Operator::IsCa, args) => {
            if let Some(a) = args.first() {
                push_unique(out, a.clone());
            }
        }
        Formula::App(_, args) => {
            for a in args {
                cas_in_formula(a, out);
            }
        }
        _ => {}
    }
}

fn cas_in_sequent(seq: &Sequent, out: &mut Vec<Formula>) {
    cas_in_formula(seq.delta.formula(), out);
    for j in &seq.gamma {
        cas_in_formula(j.formula(), out);
    }
}

/// All agents appearing under `ca(·)` anywhere in the proof.
pub fn gather_cas(pf: &Proof) -> Vec<Formula> {
    let mut out = Vec::new();
    fn walk(pf: &Proof, out: &mut Vec<Formula>) {
        cas_in_sequent(&pf.conclusion, out);
        for prem in &pf.premises {
            match prem {
                Premise::Proved(sub) => walk(sub, out),
                Premise::Open(seq) => cas_in_sequent(seq, out),
            }
        }
    }
    walk(pf, &mut out);
    out
}

// ============================================================================
// Context construction (client side)
// ============================================================================

/// The sequent context induced by a set of credentials: the CA declaration
/// and key binding, one certificate credential per distinct signator, and
/// one `sign` assumption per credential.
pub fn sequent_context(
    store: &impl EvidenceStore,
    ca: &Agent,
    creds: &[Credential],
) -> Result<Vec<Judgement>, RequestError> {
    let ca_cert = store.certificate(ca)?;
    let mut out = vec![
        Judgement::truth(Formula::ca(Formula::Agent(ca.clone()))),
        Judgement::truth(Formula::iskey(
            Formula::Agent(ca.clone()),
            Formula::key(&fingerprint(&ca_cert.public_key)),
        )),
    ];
    let mut iskeys: Vec<Judgement> = Vec::new();
    let mut props: Vec<Judgement> = Vec::new();
    for cred in creds {
        let cert = store.certificate(&cred.signator)?;
        let signing_cert = store.certificate(&cert.cred.signator)?;
        let binding = Judgement::truth(Formula::sign(
            Formula::iskey(
                Formula::Agent(cred.signator.clone()),
                Formula::key(&fingerprint(&cert.public_key)),
            ),
            Formula::key(&fingerprint(&signing_cert.public_key)),
        ));
        if !iskeys.contains(&binding) {
            iskeys.push(binding);
        }
        let prop = Judgement::truth(cred.sign_formula(&cert));
        if !props.contains(&prop) {
            props.push(prop);
        }
    }
    out.extend(iskeys);
    out.extend(props);
    Ok(out)
}

// ============================================================================
// Access requests
// ============================================================================

/// A self-contained authorization claim: the proof, the requester's
/// signature over its goal, and the supporting evidence.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AccessRequest {
    pub proof: Proof,
    pub signature: Credential,
    pub creds: Vec<Credential>,
    pub certs: Vec<Certificate>,
}

impl AccessRequest {
    /// Build a request from a proof concluding `A says open(B, R)`. The
    /// goal is signed with `requester`'s key and the proof is stripped of
    /// `sign` assumptions for transport.
    pub fn make_for_proof(
        pf: &Proof,
        requester: &Agent,
        key: &SigningKey,
        creds: Vec<Credential>,
        certs: Vec<Certificate>,
    ) -> Result<AccessRequest, RequestError> {
        let goal = match pf.conclusion.delta.formula() {
            f @ Formula::App(Operator::Says, args)
                if matches!(args.get(1), Some(Formula::App(Operator::Open, _))) =>
            {
                f.clone()
            }
            _ => return Err(RequestError::InvalidGoal(pf.conclusion.delta.to_string())),
        };
        let signature = Credential::sign(goal, requester.clone(), key);
        Ok(AccessRequest {
            proof: rebase_proof(pf, &[]),
            signature,
            creds,
            certs,
        })
    }
}

impl std::fmt::Display for AccessRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "---- access request ----")?;
        writeln!(f, "{}", self.signature)?;
        for cred in &self.creds {
            writeln!(f, "-- credential --")?;
            writeln!(f, "{cred}")?;
        }
        for cert in &self.certs {
            writeln!(f, "-- certificate --")?;
            writeln!(f, "{cert}")?;
        }
        write!(f, "------------------------")
    }
}

/// Assemble an access request for `pf` on behalf of `requester`, pulling
/// the certificates and credentials the proof references from the store.
pub fn generate_request(
    pf: &Proof,
    requester: &Agent,
    store: &impl EvidenceStore,
) -> Result<AccessRequest, RequestError> {
    let signs = gather_credentials(pf);

    // Certificates: every CA mentioned, the requester, and every subject
    // of a certificate credential used by the proof.
    let mut cert_agents: Vec<Agent> = gather_cas(pf)
        .into_iter()
        .filter_map(|f| match f {
            Formula::Agent(a) => Some(a),
            _ => None,
        })
        .collect();
    if !cert_agents.contains(requester) {
        cert_agents.push(requester.clone());
    }
    for sg in &signs {
        let Formula::App(Operator::Sign, args) = sg else {
            continue;
        };
        if let Some(Formula::App(Operator::IsKey, inner)) = args.first() {
            if let Some(Formula::Agent(subject)) = inner.first() {
                if !cert_agents.contains(subject) {
                    cert_agents.push(subject.clone());
                }
            }
        }
    }
    let certs = cert_agents
        .iter()
        .map(|a| store.certificate(a))
        .collect::<Result<Vec<_>, _>>()?;

    // Policy credentials: the `sign` formulas that are not key bindings.
    let policy: Vec<&Formula> = signs
        .iter()
        .filter(|sg| {
            !matches!(
                sg,
                Formula::App(Operator::Sign, args)
                    if matches!(args.first(), Some(Formula::App(Operator::IsKey, _)))
            )
        })
        .collect();
    let mut by_formula: HashMap<Formula, Credential> = HashMap::new();
    for cred in store.credentials()? {
        let cert = store.certificate(&cred.signator)?;
        by_formula.insert(cred.sign_formula(&cert), cred);
    }
    let creds = policy
        .into_iter()
        .map(|f| {
            by_formula
                .get(f)
                .cloned()
                .ok_or_else(|| RequestError::MissingCredential(f.to_string()))
        })
        .collect::<Result<Vec<_>, _>>()?;

    let key = store.signing_key(requester)?;
    AccessRequest::make_for_proof(pf, requester, &key, creds, certs)
}

// ============================================================================
// Verification (server side)
// ============================================================================

/// The stateless verification endpoint: trusted roots plus the issuing
/// identity used to sign acceptance credentials.
pub struct Authorizer {
    pub roots: Vec<Certificate>,
    pub issuer: Agent,
    issuer_key: SigningKey,
}

impl Authorizer {
    pub fn new(roots: Vec<Certificate>, issuer: Agent, issuer_key: SigningKey) -> Authorizer {
        Authorizer { roots, issuer, issuer_key }
    }

    /// Verify a request end to end and, on acceptance, mint a credential
    /// over the granted `open` formula signed with the issuer key.
    pub fn verify_request(&self, req: &AccessRequest) -> Result<Credential, RejectError> {
        // Phase 1: certificate chains.
        let chain: HashMap<Agent, Certificate> = req
            .certs
            .iter()
            .map(|c| (c.subject.clone(), c.clone()))
            .collect();
        for cert in &req.certs {
            verify_cert(cert, &chain, &self.roots)?;
        }

        // Phase 2: credential signatures, under certified keys only.
        for cred in &req.creds {
            let cert = chain
                .get(&cred.signator)
                .ok_or_else(|| RejectError::UnknownSignator(cred.signator.0.clone()))?;
            if !cred.verify_signature(&cert.public_key) {
                return Err(RejectError::BadCredential(cred.signator.0.clone()));
            }
        }
        let requester_cert = chain
            .get(&req.signature.signator)
            .ok_or_else(|| RejectError::UnknownSignator(req.signature.signator.0.clone()))?;
        if !req.signature.verify_signature(&requester_cert.public_key) {
            return Err(RejectError::BadRequestSignature(
                req.signature.signator.0.clone(),
            ));
        }

        // The signed goal must be the grant the proof concludes.
        let grant = match &req.signature.statement {
            Formula::App(Operator::Says, args)
                if matches!(args.get(1), Some(Formula::App(Operator::Open, _))) =>
            {
                args[1].clone()
            }
            other => return Err(RejectError::InvalidGoal(other.to_string())),
        };
        if req.proof.conclusion.delta
            != Judgement::truth(req.signature.statement.clone())
        {
            return Err(RejectError::GoalMismatch(
                req.proof.conclusion.delta.to_string(),
            ));
        }

        // Phase 3: reconstruct the admissible context from the verified
        // evidence, rebase the proof onto it, and check every step.
        let mut gamma: Vec<Judgement> = Vec::new();
        let cas = get_cas(&req.proof.conclusion);
        for ca in &cas {
            gamma.push(Judgement::truth(Formula::ca(Formula::Agent(ca.clone()))));
        }
        for ca in &cas {
            let cert = chain
                .get(ca)
                .ok_or_else(|| RejectError::UnknownCa(ca.0.clone()))?;
            gamma.push(Judgement::truth(Formula::iskey(
                Formula::Agent(ca.clone()),
                Formula::key(&fingerprint(&cert.public_key)),
            )));
        }
        for cert in &req.certs {
            let issuer_cert = chain
                .get(&cert.cred.signator)
                .ok_or_else(|| RejectError::UnknownSignator(cert.cred.signator.0.clone()))?;
            gamma.push(Judgement::truth(cert.cred.sign_formula(issuer_cert)));
        }
        for cred in &req.creds {
            let cert = chain
                .get(&cred.signator)
                .ok_or_else(|| RejectError::UnknownSignator(cred.signator.0.clone()))?;
            gamma.push(Judgement::truth(cred.sign_formula(cert)));
        }
        let mut deduped: Vec<Judgement> = Vec::with_capacity(gamma.len());
        for j in gamma {
            if !deduped.contains(&j) {
                deduped.push(j);
            }
        }

        let rooted = Proof::new(
            req.proof.premises.clone(),
            Sequent::new(deduped.clone(), req.proof.conclusion.delta.clone()),
            req.proof.rule,
        );
        let rebased = rebase_proof(&rooted, &deduped);
        let obligations = verify(&rebased);
        if let Some(first) = obligations.first() {
            tracing::debug!(obligation = %first, "request proof left open obligations");
            return Err(RejectError::OpenObligations(first.to_string()));
        }

        Ok(Credential::sign(grant, self.issuer.clone(), &self.issuer_key))
    }
}

// ============================================================================
// Tests
// ============================================================================
