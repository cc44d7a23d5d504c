//! Tactics and proof search
//!
//! A [`Tactic`] maps a goal sequent to a set of candidate proofs, each of
//! which may still carry open obligations. Combinators compose tactics
//! into pipelines; [`chain`] splices obligation proofs into a parent
//! proof; [`get_one_proof`] selects the first candidate that verifies
//! closed. Search is depth-bounded by construction — pipelines are finite
//! sequences, not iterative deepening.

#![forbid(unsafe_code)]
#![allow(missing_docs)]

use std::collections::{HashMap, HashSet};

use crate::context::is_key;
use crate::logic::{
    Agent, Formula, Judgement, Operator, Premise, Proof, Rule, Sequent, Substitution,
};
use crate::matcher::match_sequents;
use crate::rules::{AFF_CUT, CERT, CUT, FORALL_LEFT, FORALL_LEFT_AFF, IDENTITY, SIGN};
use crate::verifier::{is_closed, verify};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TacticError {
    #[error("RuleTactic cannot be applied to quantifier rules (got {0})")]
    QuantifierRule(&'static str),
    #[error("SignTactic requires a `sign` credential formula, got {0}")]
    NotASignFormula(String),
    #[error("CertTactic requires an `iskey` formula, got {0}")]
    NotAnIsKeyFormula(String),
}

/// A proof-search capability: produce candidate proofs for a goal.
pub trait Tactic {
    fn apply(&self, seq: &Sequent) -> HashSet<Proof>;
}

// ----------------------------------------------------------------------------
// RuleTactic
// ----------------------------------------------------------------------------

/// Apply one non-quantifier rule wherever it unifies with the goal.
///
/// Assumptions consumed by the match are removed from the premises and the
/// remaining goal assumptions are carried over, so context is never lost
/// across an application and repeated pipelines cannot loop on one step.
pub struct RuleTactic {
    rule: &'static Rule,
}

impl RuleTactic {
    pub fn new(rule: &'static Rule) -> Result<RuleTactic, TacticError> {
        if matches!(rule.name, "@L" | "@R") {
            return Err(TacticError::QuantifierRule(rule.name));
        }
        Ok(RuleTactic { rule })
    }
}

fn dedup_gamma(gamma: Vec<Judgement>) -> Vec<Judgement> {
    let mut seen = HashSet::new();
    gamma.into_iter().filter(|j| seen.insert(j.clone())).collect()
}

impl Tactic for RuleTactic {
    fn apply(&self, seq: &Sequent) -> HashSet<Proof> {
        let mut pfs = HashSet::new();
        for rho in match_sequents(&self.rule.conclusion, seq, Substitution::new()) {
            let rule_gamma = self.rule.conclusion.apply(&rho).gamma;
            let red_gamma: Vec<Judgement> = seq
                .gamma
                .iter()
                .filter(|j| !rule_gamma.contains(j))
                .cloned()
                .collect();
            let premises: Vec<Premise> = self
                .rule
                .premises
                .iter()
                .map(|prem| {
                    let inst = prem.apply(&rho);
                    let mut gamma = inst.gamma;
                    gamma.extend(red_gamma.iter().cloned());
                    Premise::Open(Sequent::new(dedup_gamma(gamma), inst.delta))
                })
                .collect();
            pfs.insert(Proof::new(premises, seq.clone(), self.rule));
        }
        pfs
    }
}

// ----------------------------------------------------------------------------
// InstantiateForallTactic
// ----------------------------------------------------------------------------

/// For each quantified assumption and each candidate ground term, produce
/// one `@L`/`@Laff` application instantiating the bound variable. The
/// quantified assumption is consumed so the step cannot repeat, and
/// instantiations already present in the context are skipped.
pub struct InstantiateForallTactic {
    grounds: Vec<Formula>,
}

impl InstantiateForallTactic {
    pub fn new(grounds: Vec<Formula>) -> InstantiateForallTactic {
        InstantiateForallTactic { grounds }
    }
}

impl Tactic for InstantiateForallTactic {
    fn apply(&self, seq: &Sequent) -> HashSet<Proof> {
        let mut pfs = HashSet::new();
        for j in &seq.gamma {
            let Formula::Forall(x, body) = j.formula() else {
                continue;
            };
            for ground in &self.grounds {
                let mut sub = Substitution::new();
                sub.insert(x.clone(), ground.clone());
                let new_assume = Judgement::truth(body.apply(&sub));
                if seq.gamma.contains(&new_assume) {
                    continue;
                }
                let mut gamma: Vec<Judgement> =
                    seq.gamma.iter().filter(|p| *p != j).cloned().collect();
                gamma.push(new_assume);
                let rule = match seq.delta {
                    Judgement::Proposition(_) => &*FORALL_LEFT,
                    Judgement::Affirmation(_, _) => &*FORALL_LEFT_AFF,
                };
                pfs.insert(Proof::new(
                    vec![Premise::Open(Sequent::new(gamma, seq.delta.clone()))],
                    seq.clone(),
                    rule,
                ));
            }
        }
        pfs
    }
}

// ----------------------------------------------------------------------------
// SignTactic
// ----------------------------------------------------------------------------

/// Lift a signed credential into the context as a `says` assumption.
///
/// Given a credential `sign(P, [k])` and the agent who owns `[k]`, cut in
/// `agent says P`: the left premise of the cut closes immediately via the
/// `sign` rule (whose own premises close via `id`), and the right premise
/// is the original goal extended with the new `says` assumption. Applies
/// only when both `sign(P, [k])` and `iskey(agent, [k])` are assumptions,
/// and not when the `says` is already present.
pub struct SignTactic {
    cred: Formula,
    says: Formula,
    iskey: Formula,
}

impl SignTactic {
    pub fn new(cred: Formula, agent: Agent) -> Result<SignTactic, TacticError> {
        let Formula::App(Operator::Sign, args) = &cred else {
            return Err(TacticError::NotASignFormula(cred.to_string()));
        };
        let (Some(statement), Some(key)) = (args.first().cloned(), args.get(1).cloned())
        else {
            return Err(TacticError::NotASignFormula(cred.to_string()));
        };
        let agent = Formula::Agent(agent);
        Ok(SignTactic {
            says: Formula::says(agent.clone(), statement),
            iskey: Formula::iskey(agent, key),
            cred,
        })
    }
}

impl Tactic for SignTactic {
    fn apply(&self, seq: &Sequent) -> HashSet<Proof> {
        let reqs = [
            Judgement::truth(self.cred.clone()),
            Judgement::truth(self.iskey.clone()),
        ];
        if !reqs.iter().all(|j| seq.gamma.contains(j)) {
            return HashSet::new();
        }
        if seq.gamma.contains(&Judgement::truth(self.says.clone())) {
            return HashSet::new();
        }
        let id = RuleTactic::new(&IDENTITY).expect("id is not a quantifier rule");
        let cutgoal = Sequent::new(seq.gamma.clone(), Judgement::truth(self.says.clone()));
        // Both sign premises are assumptions, so one id application each.
        let Some(pf_iskey) = get_one_proof(
            &Sequent::new(seq.gamma.clone(), Judgement::truth(self.iskey.clone())),
            &id,
        ) else {
            return HashSet::new();
        };
        let Some(pf_cred) = get_one_proof(
            &Sequent::new(seq.gamma.clone(), Judgement::truth(self.cred.clone())),
            &id,
        ) else {
            return HashSet::new();
        };
        let pf_cutgoal = Proof::new(
            vec![Premise::Proved(pf_iskey), Premise::Proved(pf_cred)],
            cutgoal,
            &SIGN,
        );
        let mut new_gamma = seq.gamma.clone();
        new_gamma.push(Judgement::truth(self.says.clone()));
        let newgoal = Sequent::new(new_gamma, seq.delta.clone());
        let rule = match seq.delta {
            Judgement::Proposition(_) => &*CUT,
            Judgement::Affirmation(_, _) => &*AFF_CUT,
        };
        HashSet::from([Proof::new(
            vec![Premise::Proved(pf_cutgoal), Premise::Open(newgoal)],
            seq.clone(),
            rule,
        )])
    }
}

// ----------------------------------------------------------------------------
// CertTactic
// ----------------------------------------------------------------------------

/// Lift a certified key binding into the context as an `iskey` assumption.
///
/// The counterpart of [`SignTactic`] for the `cert` rule: when `ca(A)` and
/// `A says iskey(B, [k])` are both assumptions, cut in `iskey(B, [k])`,
/// closing the left premise with `cert` over two `id` applications.
pub struct CertTactic {
    iskey: Formula,
    ca: Formula,
    says: Formula,
}

impl CertTactic {
    pub fn new(iskey: Formula, ca: Agent) -> Result<CertTactic, TacticError> {
        if !matches!(&iskey, Formula::App(Operator::IsKey, _)) {
            return Err(TacticError::NotAnIsKeyFormula(iskey.to_string()));
        }
        let ca = Formula::Agent(ca);
        Ok(CertTactic {
            ca: Formula::ca(ca.clone()),
            says: Formula::says(ca, iskey.clone()),
            iskey,
        })
    }
}

impl Tactic for CertTactic {
    fn apply(&self, seq: &Sequent) -> HashSet<Proof> {
        let reqs = [
            Judgement::truth(self.ca.clone()),
            Judgement::truth(self.says.clone()),
        ];
        if !reqs.iter().all(|j| seq.gamma.contains(j)) {
            return HashSet::new();
        }
        if seq.gamma.contains(&Judgement::truth(self.iskey.clone())) {
            return HashSet::new();
        }
        let id = RuleTactic::new(&IDENTITY).expect("id is not a quantifier rule");
        let cutgoal = Sequent::new(seq.gamma.clone(), Judgement::truth(self.iskey.clone()));
        let Some(pf_ca) = get_one_proof(
            &Sequent::new(seq.gamma.clone(), Judgement::truth(self.ca.clone())),
            &id,
        ) else {
            return HashSet::new();
        };
        let Some(pf_says) = get_one_proof(
            &Sequent::new(seq.gamma.clone(), Judgement::truth(self.says.clone())),
            &id,
        ) else {
            return HashSet::new();
        };
        let pf_cutgoal = Proof::new(
            vec![Premise::Proved(pf_ca), Premise::Proved(pf_says)],
            cutgoal,
            &CERT,
        );
        let mut new_gamma = seq.gamma.clone();
        new_gamma.push(Judgement::truth(self.iskey.clone()));
        let newgoal = Sequent::new(new_gamma, seq.delta.clone());
        let rule = match seq.delta {
            Judgement::Proposition(_) => &*CUT,
            Judgement::Affirmation(_, _) => &*AFF_CUT,
        };
        HashSet::from([Proof::new(
            vec![Premise::Proved(pf_cutgoal), Premise::Open(newgoal)],
            seq.clone(),
            rule,
        )])
    }
}

// ----------------------------------------------------------------------------
// Combinators
// ----------------------------------------------------------------------------

/// Apply a sequence of tactics, chaining later proofs onto the open
/// obligations left by earlier ones.
///
/// With `pass_on` set (the default for most pipelines), a tactic that
/// yields nothing is skipped and the next one sees the same sequent;
/// without it, an empty result short-circuits the whole pipeline.
pub struct ThenTactic {
    ts: Vec<Box<dyn Tactic>>,
    pass_on: bool,
}

impl ThenTactic {
    pub fn new(ts: Vec<Box<dyn Tactic>>, pass_on: bool) -> ThenTactic {
        ThenTactic { ts, pass_on }
    }

    fn apply_slice(ts: &[Box<dyn Tactic>], pass_on: bool, seq: &Sequent) -> HashSet<Proof> {
        let mut pfs = HashSet::new();
        let Some((t1, rest)) = ts.split_first() else {
            return pfs;
        };
        let t1_pfs = t1.apply(seq);
        if t1_pfs.is_empty() {
            return if pass_on {
                Self::apply_slice(rest, pass_on, seq)
            } else {
                HashSet::new()
            };
        }
        for pf1 in t1_pfs {
            let obs: Vec<Sequent> = verify(&pf1).into_iter().filter(|ob| ob != seq).collect();
            // All branches closed: nothing further can improve this proof.
            if obs.is_empty() {
                return HashSet::from([pf1]);
            }
            let mut pools: Vec<(Sequent, Vec<Proof>)> = Vec::new();
            for ob in obs {
                let sub_pfs: Vec<Proof> =
                    Self::apply_slice(rest, pass_on, &ob).into_iter().collect();
                if !sub_pfs.is_empty() {
                    pools.push((ob, sub_pfs));
                }
            }
            if pools.is_empty() {
                pfs.insert(pf1);
                continue;
            }
            // Try every combination of per-obligation proofs; any of them
            // might be the one that closes.
            let mut index = vec![0usize; pools.len()];
            loop {
                let chains: HashMap<Sequent, Proof> = pools
                    .iter()
                    .zip(index.iter())
                    .map(|((ob, ps), i)| (ob.clone(), ps[*i].clone()))
                    .collect();
                pfs.insert(chain(&pf1, &chains));
                let mut carry = pools.len();
                while carry > 0 {
                    index[carry - 1] += 1;
                    if index[carry - 1] < pools[carry - 1].1.len() {
                        break;
                    }
                    index[carry - 1] = 0;
                    carry -= 1;
                }
                if carry == 0 {
                    break;
                }
            }
        }
        pfs
    }
}

impl Tactic for ThenTactic {
    fn apply(&self, seq: &Sequent) -> HashSet<Proof> {
        Self::apply_slice(&self.ts, self.pass_on, seq)
    }
}

/// Apply tactics in order until one produces proofs; return those.
pub struct OrElseTactic {
    ts: Vec<Box<dyn Tactic>>,
}

impl OrElseTactic {
    pub fn new(ts: Vec<Box<dyn Tactic>>) -> OrElseTactic {
        OrElseTactic { ts }
    }
}

impl Tactic for OrElseTactic {
    fn apply(&self, seq: &Sequent) -> HashSet<Proof> {
        for t in &self.ts {
            let pfs = t.apply(seq);
            if !pfs.is_empty() {
                return pfs;
            }
        }
        HashSet::new()
    }
}

// ----------------------------------------------------------------------------
// Splicing and drivers
// ----------------------------------------------------------------------------

/// Replace open obligations in `pf` with the proofs `chains` maps them to.
///
/// Descends through closed sub-proofs, which may themselves contain open
/// leaves. If the map covers `pf`'s own conclusion, that proof replaces
/// the whole subtree. Obligations absent from the map are left open.
pub fn chain(pf: &Proof, chains: &HashMap<Sequent, Proof>) -> Proof {
    if let Some(whole) = chains.get(&pf.conclusion) {
        return whole.clone();
    }
    let premises = pf
        .premises
        .iter()
        .map(|prem| match prem {
            Premise::Proved(sub) => Premise::Proved(chain(sub, chains)),
            Premise::Open(ob) => match chains.get(ob) {
                Some(sub) => Premise::Proved(sub.clone()),
                None => Premise::Open(ob.clone()),
            },
        })
        .collect();
    Proof::new(premises, pf.conclusion.clone(), pf.rule)
}

/// First proof from the tactic that verifies with no open obligations.
pub fn get_one_proof(seq: &Sequent, t: &dyn Tactic) -> Option<Proof> {
    t.apply(seq).into_iter().find(is_closed)
}

/// Built-in demo driver: closes modus-ponens goals such as
/// `P -> Q true, P true |- Q true`.
pub fn prove(seq: &Sequent) -> Option<Proof> {
    let t = ThenTactic::new(
        vec![
            Box::new(RuleTactic::new(&crate::rules::IMP_LEFT).expect("->L is not a quantifier rule")),
            Box::new(RuleTactic::new(&IDENTITY).expect("id is not a quantifier rule")),
        ],
        true,
    );
    get_one_proof(seq, &t)
}

/// Authorization driver: lift the signed evidence found in the context —
/// certificate credentials, then the key bindings they certify, then
/// policy credentials — and close with `id`.
pub fn prove_access(seq: &Sequent) -> Option<Proof> {
    let mut ts: Vec<Box<dyn Tactic>> = Vec::new();

    // Certificate credentials sign(iskey(B, pk), k) whose signing key k is
    // directly bound in the context.
    for j in &seq.gamma {
        let Formula::App(Operator::Sign, args) = j.formula() else {
            continue;
        };
        let (statement, key) = (&args[0], &args[1]);
        if !matches!(statement, Formula::App(Operator::IsKey, _)) {
            continue;
        }
        let Some(owner) = direct_key_owner(seq, key) else {
            continue;
        };
        if let Ok(t) = SignTactic::new(j.formula().clone(), owner.clone()) {
            ts.push(Box::new(t));
        }
        if let Ok(t) = CertTactic::new(statement.clone(), owner) {
            ts.push(Box::new(t));
        }
    }

    // Policy credentials sign(P, k); the key owner may itself be certified
    // by one of the credentials lifted above.
    let candidates = candidate_agents(seq);
    for j in &seq.gamma {
        let Formula::App(Operator::Sign, args) = j.formula() else {
            continue;
        };
        let (statement, key) = (&args[0], &args[1]);
        if matches!(statement, Formula::App(Operator::IsKey, _)) {
            continue;
        }
        let Formula::Key(k) = key else {
            continue;
        };
        let Some(owner) = candidates.iter().find(|a| is_key(k, a, seq)) else {
            continue;
        };
        if let Ok(t) = SignTactic::new(j.formula().clone(), owner.clone()) {
            ts.push(Box::new(t));
        }
    }

    ts.push(Box::new(
        RuleTactic::new(&IDENTITY).expect("id is not a quantifier rule"),
    ));
    get_one_proof(seq, &ThenTactic::new(ts, true))
}

fn direct_key_owner(seq: &Sequent, key: &Formula) -> Option<Agent> {
    for j in &seq.gamma {
        if let Formula::App(Operator::IsKey, args) = j.formula() {
            if let (Formula::Agent(a), k) = (&args[0], &args[1]) {
                if k == key {
                    return Some(a.clone());
                }
            }
        }
    }
    None
}

fn candidate_agents(seq: &Sequent) -> Vec<Agent> {
    let mut out: Vec<Agent> = Vec::new();
    let mut push = |f: &Formula| {
        if let Formula::Agent(a) = f {
            if !out.contains(a) {
                out.push(a.clone());
            }
        }
    };
    for j in &seq.gamma {
        for a in j.formula().agents() {
            push(&a);
        }
    }
    for a in seq.delta.formula().agents() {
        push(&a);
    }
    out
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logic::Agent;

    fn truth(p: Formula) -> Judgement {
        Judgement::truth(p)
    }

    #[test]
    fn rule_tactic_rejects_quantifier_rules() {
        assert!(RuleTactic::new(&FORALL_LEFT).is_err());
        assert!(RuleTactic::new(&crate::rules::FORALL_RIGHT).is_err());
        assert!(RuleTactic::new(&IDENTITY).is_ok());
    }

    #[test]
    fn modus_ponens_closes() {
        // Scenario: P -> Q true, P true |- Q true via ->L then id.
        let seq = Sequent::new(
            vec![
                truth(Formula::implies(Formula::var("P"), Formula::var("Q"))),
                truth(Formula::var("P")),
            ],
            truth(Formula::var("Q")),
        );
        let pf = prove(&seq).expect("modus ponens should close");
        assert!(verify(&pf).is_empty());
        assert_eq!(pf.conclusion, seq);
        // The schematic atoms of the goal flow through the whole tree.
        assert!(pf.vars().contains(&crate::logic::Variable("P".to_string())));
    }

    #[test]
    fn prove_fails_without_matching_assumptions() {
        let seq = Sequent::new(vec![], truth(Formula::var("Q")));
        assert!(prove(&seq).is_none());
    }

    #[test]
    fn sign_tactic_introduces_says() {
        let cred = Formula::sign(
            Formula::open(Formula::agent("#b"), Formula::resource("<r>")),
            Formula::key("[k]"),
        );
        let iskey = Formula::iskey(Formula::agent("#a"), Formula::key("[k]"));
        let says = Formula::says(
            Formula::agent("#a"),
            Formula::open(Formula::agent("#b"), Formula::resource("<r>")),
        );
        let seq = Sequent::new(
            vec![truth(iskey), truth(cred.clone())],
            truth(says.clone()),
        );
        let t = SignTactic::new(cred, Agent("#a".to_string())).unwrap();
        let then = ThenTactic::new(
            vec![
                Box::new(t),
                Box::new(RuleTactic::new(&IDENTITY).unwrap()),
            ],
            true,
        );
        let pf = get_one_proof(&seq, &then).expect("signed delegation should close");
        assert!(verify(&pf).is_empty());
    }

    #[test]
    fn sign_tactic_requires_its_evidence() {
        let cred = Formula::sign(Formula::var("P"), Formula::key("[k]"));
        let t = SignTactic::new(cred, Agent("#a".to_string())).unwrap();
        // Neither the credential nor the key binding is assumed.
        let seq = Sequent::new(vec![], truth(Formula::var("P")));
        assert!(t.apply(&seq).is_empty());
    }

    #[test]
    fn sign_tactic_rejects_non_sign_formula() {
        assert!(SignTactic::new(Formula::truth(), Agent("#a".into())).is_err());
    }

    #[test]
    fn says_pipeline_closes_affirmation_route() {
        // |- #a says P via saysR, saysL, aff, id.
        let says = Formula::says(Formula::agent("#a"), Formula::var("P"));
        let seq = Sequent::new(vec![truth(says.clone())], truth(says));
        let t = ThenTactic::new(
            vec![
                Box::new(RuleTactic::new(&crate::rules::SAYS_RIGHT).unwrap()),
                Box::new(RuleTactic::new(&crate::rules::SAYS_LEFT).unwrap()),
                Box::new(RuleTactic::new(&crate::rules::AFF).unwrap()),
                Box::new(RuleTactic::new(&IDENTITY).unwrap()),
            ],
            true,
        );
        let pf = get_one_proof(&seq, &t).expect("says round trip should close");
        assert!(verify(&pf).is_empty());
    }

    #[test]
    fn instantiate_forall_then_id_closes() {
        let x = crate::logic::Variable("x".to_string());
        let body = Formula::open(Formula::var("x"), Formula::resource("<r>"));
        let goal = Formula::open(Formula::agent("#a"), Formula::resource("<r>"));
        let seq = Sequent::new(
            vec![truth(Formula::forall(x, body))],
            truth(goal),
        );
        let t = ThenTactic::new(
            vec![
                Box::new(InstantiateForallTactic::new(vec![Formula::agent("#a")])),
                Box::new(RuleTactic::new(&IDENTITY).unwrap()),
            ],
            true,
        );
        let pf = get_one_proof(&seq, &t).expect("instantiation should close");
        assert!(verify(&pf).is_empty());
    }

    #[test]
    fn or_else_returns_first_nonempty() {
        let seq = Sequent::new(vec![truth(Formula::var("P"))], truth(Formula::var("P")));
        let t = OrElseTactic::new(vec![
            Box::new(RuleTactic::new(&crate::rules::SAYS_RIGHT).unwrap()),
            Box::new(RuleTactic::new(&IDENTITY).unwrap()),
        ]);
        let pfs = t.apply(&seq);
        assert_eq!(pfs.len(), 1);
        assert!(pfs.iter().all(|pf| pf.rule.name == "id"));
    }

    #[test]
    fn chain_splices_obligation_proofs() {
        let premise = Sequent::new(vec![truth(Formula::var("P"))], truth(Formula::var("P")));
        let conclusion = Sequent::new(
            vec![truth(Formula::var("Q")), truth(Formula::var("P"))],
            truth(Formula::var("P")),
        );
        let open = Proof::new(
            vec![Premise::Open(premise.clone())],
            conclusion,
            &crate::rules::WEAKEN,
        );
        let closer = Proof::new(vec![], premise.clone(), &IDENTITY);
        let chains = HashMap::from([(premise, closer)]);
        let spliced = chain(&open, &chains);
        assert!(matches!(spliced.premises[0], Premise::Proved(_)));
        assert!(verify(&spliced).is_empty());
    }

    #[test]
    fn chain_short_circuits_on_root_conclusion() {
        let seq = Sequent::new(vec![truth(Formula::var("P"))], truth(Formula::var("P")));
        let open = Proof::new(
            vec![Premise::Open(seq.clone())],
            seq.clone(),
            &crate::rules::WEAKEN,
        );
        let closer = Proof::new(vec![], seq.clone(), &IDENTITY);
        let chains = HashMap::from([(seq, closer.clone())]);
        assert_eq!(chain(&open, &chains), closer);
    }

    #[test]
    fn prove_access_closes_delegation_chain() {
        // ca(#ca), iskey(#ca, [kca]), a certificate credential binding
        // #root to [kroot], and a policy credential granting #b access:
        // the driver must derive `#root says open(#b, <r>)`.
        let kca = Formula::key("[kca]");
        let kroot = Formula::key("[kroot]");
        let root_binding = Formula::iskey(Formula::agent("#root"), kroot.clone());
        let gamma = vec![
            truth(Formula::ca(Formula::agent("#ca"))),
            truth(Formula::iskey(Formula::agent("#ca"), kca.clone())),
            truth(Formula::sign(root_binding, kca)),
            truth(Formula::sign(
                Formula::open(Formula::agent("#b"), Formula::resource("<r>")),
                kroot,
            )),
        ];
        let goal = Formula::says(
            Formula::agent("#root"),
            Formula::open(Formula::agent("#b"), Formula::resource("<r>")),
        );
        let seq = Sequent::new(gamma, truth(goal));
        let pf = prove_access(&seq).expect("delegation chain should close");
        assert!(verify(&pf).is_empty());
        assert_eq!(pf.conclusion, seq);
    }

    #[test]
    fn incomplete_proof_is_rejected_by_the_driver() {
        // Scenario: same goal but the policy credential is missing; no
        // closed proof exists and the driver reports failure.
        let kca = Formula::key("[kca]");
        let gamma = vec![
            truth(Formula::ca(Formula::agent("#ca"))),
            truth(Formula::iskey(Formula::agent("#ca"), kca)),
        ];
        let goal = Formula::says(
            Formula::agent("#root"),
            Formula::open(Formula::agent("#b"), Formula::resource("<r>")),
        );
        let seq = Sequent::new(gamma, truth(goal));
        assert!(prove_access(&seq).is_none());
    }
}
