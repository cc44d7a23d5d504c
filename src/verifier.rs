//! Step-by-step proof verification
//!
//! Every proof node is checked against a per-rule structural predicate:
//! premise count, the shape of the conclusion and premise goals, that the
//! premise contexts are a legal rewrite of the conclusion context (no
//! smuggled assumptions), and the rule's side conditions (goal-in-context
//! for `id`, witness freshness for `@R`, strict agent/key agreement for
//! `sign` and `cert`, and so on).
//!
//! [`verify`] walks a proof and returns its open obligations: the leaf
//! sequents still to be discharged. An illegal step short-circuits to the
//! offending conclusion, with the violation reported through `tracing` at
//! debug level. A proof is *closed* iff the result is empty. Results are
//! memoized process-wide by proof value.

#![forbid(unsafe_code)]
#![allow(missing_docs)]

use std::collections::{HashMap, HashSet};
use std::sync::{LazyLock, Mutex};

use crate::logic::{Formula, Judgement, Operator, Premise, Proof, Sequent, Substitution};
use crate::matcher::match_formulas;
use crate::rules;

/// Why a proof step is illegal. The message content mirrors the feedback
/// the service reports to requesters.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Violation {
    #[error("{rule} rule expects {want} premises, {got} are given")]
    PremiseCount {
        rule: &'static str,
        want: usize,
        got: usize,
    },
    #[error("{rule} rule requires a {want} judgement as goal, got {got}")]
    GoalKind {
        rule: &'static str,
        want: &'static str,
        got: String,
    },
    #[error("{rule} rule expects {want} goal, got {got}")]
    GoalShape {
        rule: &'static str,
        want: &'static str,
        got: String,
    },
    #[error("{rule} rule requires a {want} judgement as {which} premise goal, got {got}")]
    PremiseGoalKind {
        rule: &'static str,
        want: &'static str,
        which: &'static str,
        got: String,
    },
    #[error("{rule} rule needs {want} in the assumptions")]
    NoMatchingAssumption {
        rule: &'static str,
        want: &'static str,
    },
    #[error("proof goal ({goal}) not in assumptions")]
    GoalNotAssumed { goal: String },
    #[error("illegal assumptions in {which} premise: {assumes}")]
    IllegalAssumptions {
        which: &'static str,
        assumes: String,
    },
    #[error("goals do not match: {conclusion}, {premise}")]
    GoalMismatch { conclusion: String, premise: String },
    #[error("premise assumptions are not a subset of the conclusion: {assumes}")]
    NotSubset { assumes: String },
    #[error("could not unify {got} with {pattern} by substituting {var}")]
    BadInstantiation {
        got: String,
        pattern: String,
        var: String,
    },
    #[error("expected an instantiated quantifier assumption in premise, one of: {needed}")]
    MissingInstantiated { needed: String },
    #[error("illegal substitution, {var} already appears in sequent")]
    WitnessNotFresh { var: String },
    #[error("premise goal does not match conclusion affirmation")]
    AffMismatch,
    #[error("mismatched agents: {left} and {right}")]
    AgentMismatch { left: String, right: String },
    #[error("mismatched statements: ({left}) and ({right})")]
    StatementMismatch { left: String, right: String },
    #[error("mismatched keys: {left} and {right}")]
    KeyMismatch { left: String, right: String },
    #[error("unknown rule: {0}")]
    UnknownRule(String),
}

// ----------------------------------------------------------------------------
// Small helpers over assumption lists
// ----------------------------------------------------------------------------

fn gset(gamma: &[Judgement]) -> HashSet<&Judgement> {
    gamma.iter().collect()
}

fn joined(extras: &[&Judgement]) -> String {
    extras
        .iter()
        .map(|j| j.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

fn extras<'a>(gamma: &'a [Judgement], allowed: &HashSet<&Judgement>) -> Vec<&'a Judgement> {
    let mut seen: HashSet<&Judgement> = HashSet::new();
    gamma
        .iter()
        .filter(|j| !allowed.contains(*j) && seen.insert(*j))
        .collect()
}

fn premise_count(pf: &Proof, want: usize) -> Result<(), Violation> {
    if pf.premises.len() != want {
        return Err(Violation::PremiseCount {
            rule: pf.rule.name,
            want,
            got: pf.premises.len(),
        });
    }
    Ok(())
}

fn subset_of_conclusion(
    pf: &Proof,
    premise: &Premise,
    which: &'static str,
) -> Result<(), Violation> {
    let allowed = gset(&pf.conclusion.gamma);
    let bad = extras(premise.gamma(), &allowed);
    if !bad.is_empty() {
        return Err(Violation::IllegalAssumptions {
            which,
            assumes: joined(&bad),
        });
    }
    Ok(())
}

// ----------------------------------------------------------------------------
// Per-rule predicates
// ----------------------------------------------------------------------------

fn check_identity(pf: &Proof) -> Result<(), Violation> {
    premise_count(pf, 0)?;
    if !matches!(pf.conclusion.delta, Judgement::Proposition(_)) {
        return Err(Violation::GoalKind {
            rule: "id",
            want: "truth",
            got: pf.conclusion.delta.to_string(),
        });
    }
    if !pf.conclusion.gamma.contains(&pf.conclusion.delta) {
        return Err(Violation::GoalNotAssumed {
            goal: pf.conclusion.delta.to_string(),
        });
    }
    Ok(())
}

fn check_false_left(pf: &Proof) -> Result<(), Violation> {
    premise_count(pf, 0)?;
    if !matches!(pf.conclusion.delta, Judgement::Proposition(_)) {
        return Err(Violation::GoalKind {
            rule: "botL",
            want: "truth",
            got: pf.conclusion.delta.to_string(),
        });
    }
    let falsum = Judgement::truth(Formula::falsity());
    if !pf.conclusion.gamma.contains(&falsum) {
        return Err(Violation::GoalNotAssumed {
            goal: falsum.to_string(),
        });
    }
    Ok(())
}

fn check_imp_right(pf: &Proof) -> Result<(), Violation> {
    premise_count(pf, 1)?;
    let Judgement::Proposition(goal) = &pf.conclusion.delta else {
        return Err(Violation::GoalKind {
            rule: "->R",
            want: "truth",
            got: pf.conclusion.delta.to_string(),
        });
    };
    let Formula::App(Operator::Implies, args) = goal else {
        return Err(Violation::GoalShape {
            rule: "->R",
            want: "an implication",
            got: goal.to_string(),
        });
    };
    let (ant, suc) = (&args[0], &args[1]);
    let premise = &pf.premises[0];
    if premise.delta() != &Judgement::truth(suc.clone()) {
        return Err(Violation::GoalMismatch {
            conclusion: suc.to_string(),
            premise: premise.delta().to_string(),
        });
    }
    let assumed = Judgement::truth(ant.clone());
    let mut allowed = gset(&pf.conclusion.gamma);
    allowed.insert(&assumed);
    let bad = extras(premise.gamma(), &allowed);
    if !bad.is_empty() {
        return Err(Violation::IllegalAssumptions {
            which: "the",
            assumes: joined(&bad),
        });
    }
    Ok(())
}

/// Shared by `->L` and `->Laff`.
fn check_imp_left(pf: &Proof) -> Result<(), Violation> {
    let has_imp = pf
        .conclusion
        .gamma
        .iter()
        .any(|j| matches!(j.formula(), Formula::App(Operator::Implies, _)));
    if !has_imp {
        return Err(Violation::NoMatchingAssumption {
            rule: pf.rule.name,
            want: "an implication",
        });
    }
    premise_count(pf, 2)?;
    let (left, right) = (&pf.premises[0], &pf.premises[1]);
    if right.delta() != &pf.conclusion.delta {
        return Err(Violation::GoalMismatch {
            conclusion: pf.conclusion.delta.to_string(),
            premise: right.delta().to_string(),
        });
    }
    subset_of_conclusion(pf, left, "left")?;
    // The right premise may additionally assume any Q whose implication
    // from the left premise's goal is already in the conclusion context.
    let allowed = gset(&pf.conclusion.gamma);
    let mut bad = Vec::new();
    for j in extras(right.gamma(), &allowed) {
        let imp = Formula::implies(left.delta().formula().clone(), j.formula().clone());
        if !pf.conclusion.gamma.contains(&Judgement::truth(imp)) {
            bad.push(j);
        }
    }
    if !bad.is_empty() {
        return Err(Violation::IllegalAssumptions {
            which: "right",
            assumes: joined(&bad),
        });
    }
    Ok(())
}

/// Shared by `@L` and `@Laff`.
fn check_forall_left(pf: &Proof) -> Result<(), Violation> {
    let has_forall = pf
        .conclusion
        .gamma
        .iter()
        .any(|j| matches!(j.formula(), Formula::Forall(_, _)));
    if !has_forall {
        return Err(Violation::NoMatchingAssumption {
            rule: pf.rule.name,
            want: "a quantified formula",
        });
    }
    premise_count(pf, 1)?;
    let premise = &pf.premises[0];
    if premise.delta() != &pf.conclusion.delta {
        return Err(Violation::GoalMismatch {
            conclusion: pf.conclusion.delta.to_string(),
            premise: premise.delta().to_string(),
        });
    }
    // Exactly one assumption may be replaced: the quantified formula on
    // the conclusion side, its instance on the premise side.
    let conc = gset(&pf.conclusion.gamma);
    let prem = gset(premise.gamma());
    let mut diff: Vec<&Judgement> = conc.symmetric_difference(&prem).copied().collect();
    diff.sort_by_key(|j| j.to_string());
    if diff.len() != 2 {
        return Err(Violation::IllegalAssumptions {
            which: "the",
            assumes: joined(&diff),
        });
    }
    let (quantified, instance) = if conc.contains(diff[0]) {
        (diff[0], diff[1])
    } else {
        (diff[1], diff[0])
    };
    let Formula::Forall(x, body) = quantified.formula() else {
        return Err(Violation::IllegalAssumptions {
            which: "the",
            assumes: joined(&diff),
        });
    };
    let rho = match_formulas(
        &[((**body).clone(), instance.formula().clone())],
        Substitution::new(),
    );
    let witness = rho.as_ref().and_then(|r| r.get(x)).cloned();
    let Some(witness) = witness else {
        return Err(Violation::BadInstantiation {
            got: instance.formula().to_string(),
            pattern: body.to_string(),
            var: x.0.clone(),
        });
    };
    let mut just_x = Substitution::new();
    just_x.insert(x.clone(), witness.clone());
    if &body.apply(&just_x) != instance.formula() {
        return Err(Violation::BadInstantiation {
            got: instance.formula().to_string(),
            pattern: body.to_string(),
            var: x.0.clone(),
        });
    }
    // At least one quantified assumption, instantiated with the witness,
    // must actually appear in the premise context.
    let instantiated: Vec<Judgement> = pf
        .conclusion
        .gamma
        .iter()
        .filter_map(|j| match j.formula() {
            Formula::Forall(y, q) => {
                let mut sub = Substitution::new();
                sub.insert(y.clone(), witness.clone());
                Some(Judgement::truth(q.apply(&sub)))
            }
            _ => None,
        })
        .collect();
    if !instantiated.iter().any(|j| prem.contains(j)) {
        return Err(Violation::MissingInstantiated {
            needed: instantiated
                .iter()
                .map(|j| j.to_string())
                .collect::<Vec<_>>()
                .join(", "),
        });
    }
    Ok(())
}

fn check_forall_right(pf: &Proof) -> Result<(), Violation> {
    let Judgement::Proposition(goal) = &pf.conclusion.delta else {
        return Err(Violation::GoalKind {
            rule: "@R",
            want: "truth",
            got: pf.conclusion.delta.to_string(),
        });
    };
    let Formula::Forall(x, body) = goal else {
        return Err(Violation::GoalShape {
            rule: "@R",
            want: "a quantified formula",
            got: goal.to_string(),
        });
    };
    premise_count(pf, 1)?;
    let premise_goal = pf.premises[0].delta().formula();
    let rho = match_formulas(
        &[((**body).clone(), premise_goal.clone())],
        Substitution::new(),
    );
    let Some(rho) = rho else {
        return Err(Violation::BadInstantiation {
            got: premise_goal.to_string(),
            pattern: body.to_string(),
            var: x.0.clone(),
        });
    };
    let Some(witness) = rho.get(x).cloned() else {
        return Err(Violation::BadInstantiation {
            got: premise_goal.to_string(),
            pattern: body.to_string(),
            var: x.0.clone(),
        });
    };
    if &body.apply(&rho) != premise_goal {
        return Err(Violation::BadInstantiation {
            got: premise_goal.to_string(),
            pattern: body.to_string(),
            var: x.0.clone(),
        });
    }
    // The witness must be fresh: a variable already occurring anywhere in
    // the conclusion cannot stand for "an arbitrary object".
    if let Formula::Var(w) = &witness {
        if pf.conclusion.vars().contains(w) {
            return Err(Violation::WitnessNotFresh { var: w.0.clone() });
        }
    }
    Ok(())
}

fn check_weaken(pf: &Proof) -> Result<(), Violation> {
    premise_count(pf, 1)?;
    let premise = &pf.premises[0];
    if premise.delta() != &pf.conclusion.delta {
        return Err(Violation::GoalMismatch {
            conclusion: pf.conclusion.delta.to_string(),
            premise: premise.delta().to_string(),
        });
    }
    let allowed = gset(&pf.conclusion.gamma);
    let bad = extras(premise.gamma(), &allowed);
    if !bad.is_empty() {
        return Err(Violation::NotSubset { assumes: joined(&bad) });
    }
    Ok(())
}

/// Shared by `cut` and `affcut`.
fn check_cut(pf: &Proof) -> Result<(), Violation> {
    premise_count(pf, 2)?;
    let (left, right) = (&pf.premises[0], &pf.premises[1]);
    if right.delta() != &pf.conclusion.delta {
        return Err(Violation::GoalMismatch {
            conclusion: pf.conclusion.delta.to_string(),
            premise: right.delta().to_string(),
        });
    }
    subset_of_conclusion(pf, left, "left")?;
    // The right premise may additionally assume exactly the cut formula.
    let cut_formula = left.delta().clone();
    let mut allowed = gset(&pf.conclusion.gamma);
    allowed.insert(&cut_formula);
    let bad = extras(right.gamma(), &allowed);
    if !bad.is_empty() {
        return Err(Violation::IllegalAssumptions {
            which: "right",
            assumes: joined(&bad),
        });
    }
    Ok(())
}

fn check_aff(pf: &Proof) -> Result<(), Violation> {
    premise_count(pf, 1)?;
    let premise = &pf.premises[0];
    let Judgement::Affirmation(_, concluded) = &pf.conclusion.delta else {
        return Err(Violation::GoalKind {
            rule: "aff",
            want: "affirmation",
            got: pf.conclusion.delta.to_string(),
        });
    };
    let Judgement::Proposition(premised) = premise.delta() else {
        return Err(Violation::PremiseGoalKind {
            rule: "aff",
            want: "truth",
            which: "the",
            got: premise.delta().to_string(),
        });
    };
    if concluded != premised {
        return Err(Violation::AffMismatch);
    }
    let allowed = gset(&pf.conclusion.gamma);
    let bad = extras(premise.gamma(), &allowed);
    if !bad.is_empty() {
        return Err(Violation::NotSubset { assumes: joined(&bad) });
    }
    Ok(())
}

fn check_says_left(pf: &Proof) -> Result<(), Violation> {
    let has_says = pf
        .conclusion
        .gamma
        .iter()
        .any(|j| matches!(j.formula(), Formula::App(Operator::Says, _)));
    if !has_says {
        return Err(Violation::NoMatchingAssumption {
            rule: "saysL",
            want: "a `says` formula",
        });
    }
    premise_count(pf, 1)?;
    let Judgement::Affirmation(speaker, _) = &pf.conclusion.delta else {
        return Err(Violation::GoalKind {
            rule: "saysL",
            want: "affirmation",
            got: pf.conclusion.delta.to_string(),
        });
    };
    let premise = &pf.premises[0];
    if premise.delta() != &pf.conclusion.delta {
        return Err(Violation::GoalMismatch {
            conclusion: pf.conclusion.delta.to_string(),
            premise: premise.delta().to_string(),
        });
    }
    // New assumptions are legal only when the affirming agent said them.
    let allowed = gset(&pf.conclusion.gamma);
    let mut bad = Vec::new();
    for j in extras(premise.gamma(), &allowed) {
        let said = Formula::says(speaker.as_formula(), j.formula().clone());
        if !pf.conclusion.gamma.contains(&Judgement::truth(said)) {
            bad.push(j);
        }
    }
    if !bad.is_empty() {
        return Err(Violation::IllegalAssumptions {
            which: "the",
            assumes: joined(&bad),
        });
    }
    Ok(())
}

fn check_says_right(pf: &Proof) -> Result<(), Violation> {
    let Judgement::Proposition(goal) = &pf.conclusion.delta else {
        return Err(Violation::GoalKind {
            rule: "saysR",
            want: "truth",
            got: pf.conclusion.delta.to_string(),
        });
    };
    let Formula::App(Operator::Says, args) = goal else {
        return Err(Violation::GoalShape {
            rule: "saysR",
            want: "a `says` formula",
            got: goal.to_string(),
        });
    };
    premise_count(pf, 1)?;
    let premise = &pf.premises[0];
    let Judgement::Affirmation(speaker, affirmed) = premise.delta() else {
        return Err(Violation::PremiseGoalKind {
            rule: "saysR",
            want: "affirmation",
            which: "the",
            got: premise.delta().to_string(),
        });
    };
    let (says_ag, says_p) = (&args[0], &args[1]);
    if says_ag != &speaker.as_formula() {
        return Err(Violation::AgentMismatch {
            left: says_ag.to_string(),
            right: speaker.to_string(),
        });
    }
    if says_p != affirmed {
        return Err(Violation::StatementMismatch {
            left: says_p.to_string(),
            right: affirmed.to_string(),
        });
    }
    let allowed = gset(&pf.conclusion.gamma);
    let bad = extras(premise.gamma(), &allowed);
    if !bad.is_empty() {
        return Err(Violation::NotSubset { assumes: joined(&bad) });
    }
    Ok(())
}

fn check_sign(pf: &Proof) -> Result<(), Violation> {
    let Judgement::Proposition(goal) = &pf.conclusion.delta else {
        return Err(Violation::GoalKind {
            rule: "sign",
            want: "truth",
            got: pf.conclusion.delta.to_string(),
        });
    };
    let Formula::App(Operator::Says, says_args) = goal else {
        return Err(Violation::GoalShape {
            rule: "sign",
            want: "a `says` formula",
            got: goal.to_string(),
        });
    };
    premise_count(pf, 2)?;
    let (left, right) = (&pf.premises[0], &pf.premises[1]);
    let Judgement::Proposition(Formula::App(Operator::IsKey, iskey_args)) = left.delta() else {
        return Err(Violation::PremiseGoalKind {
            rule: "sign",
            want: "`iskey` truth",
            which: "left",
            got: left.delta().to_string(),
        });
    };
    let Judgement::Proposition(Formula::App(Operator::Sign, sign_args)) = right.delta() else {
        return Err(Violation::PremiseGoalKind {
            rule: "sign",
            want: "`sign` truth",
            which: "right",
            got: right.delta().to_string(),
        });
    };
    let (ag, said) = (&says_args[0], &says_args[1]);
    if ag != &iskey_args[0] {
        return Err(Violation::AgentMismatch {
            left: ag.to_string(),
            right: iskey_args[0].to_string(),
        });
    }
    if said != &sign_args[0] {
        return Err(Violation::StatementMismatch {
            left: said.to_string(),
            right: sign_args[0].to_string(),
        });
    }
    if iskey_args[1] != sign_args[1] {
        return Err(Violation::KeyMismatch {
            left: iskey_args[1].to_string(),
            right: sign_args[1].to_string(),
        });
    }
    subset_of_conclusion(pf, left, "left")?;
    subset_of_conclusion(pf, right, "right")?;
    Ok(())
}

fn check_cert(pf: &Proof) -> Result<(), Violation> {
    let Judgement::Proposition(goal) = &pf.conclusion.delta else {
        return Err(Violation::GoalKind {
            rule: "cert",
            want: "truth",
            got: pf.conclusion.delta.to_string(),
        });
    };
    let Formula::App(Operator::IsKey, goal_args) = goal else {
        return Err(Violation::GoalShape {
            rule: "cert",
            want: "an `iskey` formula",
            got: goal.to_string(),
        });
    };
    premise_count(pf, 2)?;
    let (left, right) = (&pf.premises[0], &pf.premises[1]);
    let Judgement::Proposition(Formula::App(Operator::IsCa, ca_args)) = left.delta() else {
        return Err(Violation::PremiseGoalKind {
            rule: "cert",
            want: "`ca` truth",
            which: "left",
            got: left.delta().to_string(),
        });
    };
    let Judgement::Proposition(Formula::App(Operator::Says, says_args)) = right.delta() else {
        return Err(Violation::PremiseGoalKind {
            rule: "cert",
            want: "`says` truth",
            which: "right",
            got: right.delta().to_string(),
        });
    };
    let Formula::App(Operator::IsKey, said_args) = &says_args[1] else {
        return Err(Violation::PremiseGoalKind {
            rule: "cert",
            want: "`says iskey` truth",
            which: "right",
            got: right.delta().to_string(),
        });
    };
    let (ag, k) = (&goal_args[0], &goal_args[1]);
    if ag != &said_args[0] {
        return Err(Violation::AgentMismatch {
            left: ag.to_string(),
            right: said_args[0].to_string(),
        });
    }
    if ca_args[0] != says_args[0] {
        return Err(Violation::AgentMismatch {
            left: ca_args[0].to_string(),
            right: says_args[0].to_string(),
        });
    }
    if k != &said_args[1] {
        return Err(Violation::KeyMismatch {
            left: k.to_string(),
            right: said_args[1].to_string(),
        });
    }
    subset_of_conclusion(pf, left, "left")?;
    subset_of_conclusion(pf, right, "right")?;
    Ok(())
}

// ----------------------------------------------------------------------------
// Dispatch and recursion
// ----------------------------------------------------------------------------

/// Validate a single proof node (not its sub-proofs).
pub fn verify_step(pf: &Proof) -> Result<(), Violation> {
    if !rules::calculus().contains_key(pf.rule.name) {
        return Err(Violation::UnknownRule(pf.rule.name.to_string()));
    }
    match pf.rule.name {
        "id" => check_identity(pf),
        "botL" => check_false_left(pf),
        "->R" => check_imp_right(pf),
        "->L" | "->Laff" => check_imp_left(pf),
        "@L" | "@Laff" => check_forall_left(pf),
        "@R" => check_forall_right(pf),
        "W" => check_weaken(pf),
        "cut" | "affcut" => check_cut(pf),
        "aff" => check_aff(pf),
        "saysL" => check_says_left(pf),
        "saysR" => check_says_right(pf),
        "sign" => check_sign(pf),
        "cert" => check_cert(pf),
        other => Err(Violation::UnknownRule(other.to_string())),
    }
}

static MEMO: LazyLock<Mutex<HashMap<Proof, Vec<Sequent>>>> =
    LazyLock::new(|| Mutex::new(HashMap::new()));

/// Walk a proof and collect its open obligations. An illegal step yields
/// the offending conclusion as the single obligation.
pub fn verify(pf: &Proof) -> Vec<Sequent> {
    {
        let memo = MEMO.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(hit) = memo.get(pf) {
            return hit.clone();
        }
    }
    let obs = match verify_step(pf) {
        Err(violation) => {
            tracing::debug!(
                rule = pf.rule.name,
                conclusion = %pf.conclusion,
                %violation,
                "illegal proof step"
            );
            vec![pf.conclusion.clone()]
        }
        Ok(()) => {
            let mut obs: Vec<Sequent> = pf
                .premises
                .iter()
                .filter_map(|p| match p {
                    Premise::Open(s) => Some(s.clone()),
                    Premise::Proved(_) => None,
                })
                .collect();
            for premise in &pf.premises {
                if let Premise::Proved(sub) = premise {
                    obs.extend(verify(sub));
                }
            }
            obs
        }
    };
    let mut memo = MEMO.lock().unwrap_or_else(|e| e.into_inner());
    memo.insert(pf.clone(), obs.clone());
    obs
}

/// `true` iff the proof verifies with no open obligations.
pub fn is_closed(pf: &Proof) -> bool {
    verify(pf).is_empty()
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logic::{Agent, Speaker, Variable};
    use crate::rules::{CUT, FORALL_LEFT, IDENTITY, IMP_LEFT, SIGN, WEAKEN};

    fn truth(p: Formula) -> Judgement {
        Judgement::truth(p)
    }

    #[test]
    fn identity_closes_assumed_goal() {
        // Scenario: P true |- P true closes with the id rule alone.
        let seq = Sequent::new(vec![truth(Formula::var("P"))], truth(Formula::var("P")));
        let pf = Proof::new(vec![], seq, &IDENTITY);
        assert!(verify(&pf).is_empty());
    }

    #[test]
    fn identity_rejects_unassumed_goal() {
        let seq = Sequent::new(vec![truth(Formula::var("Q"))], truth(Formula::var("P")));
        let pf = Proof::new(vec![], seq.clone(), &IDENTITY);
        assert_eq!(verify(&pf), vec![seq]);
    }

    #[test]
    fn identity_rejects_extra_premises() {
        let seq = Sequent::new(vec![truth(Formula::var("P"))], truth(Formula::var("P")));
        let pf = Proof::new(vec![Premise::Open(seq.clone())], seq, &IDENTITY);
        assert_eq!(verify(&pf).len(), 1);
    }

    #[test]
    fn false_left_requires_false_assumption() {
        let with = Sequent::new(vec![truth(Formula::falsity())], truth(Formula::var("P")));
        assert!(verify(&Proof::new(vec![], with, &crate::rules::FALSE_LEFT)).is_empty());
        let without = Sequent::new(vec![truth(Formula::truth())], truth(Formula::var("P")));
        assert_eq!(
            verify(&Proof::new(vec![], without, &crate::rules::FALSE_LEFT)).len(),
            1
        );
    }

    #[test]
    fn open_premises_are_reported_as_obligations() {
        // A cut with both branches left open: two obligations come back.
        let goal = truth(Formula::var("Q"));
        let cut_formula = truth(Formula::var("P"));
        let conclusion = Sequent::new(vec![], goal.clone());
        let left = Sequent::new(vec![], cut_formula.clone());
        let right = Sequent::new(vec![cut_formula], goal);
        let pf = Proof::new(
            vec![Premise::Open(left.clone()), Premise::Open(right.clone())],
            conclusion,
            &CUT,
        );
        assert_eq!(verify(&pf), vec![left, right]);
    }

    #[test]
    fn cut_rejects_smuggled_assumptions() {
        let goal = truth(Formula::var("Q"));
        let conclusion = Sequent::new(vec![], goal.clone());
        // Left premise invents an assumption not present in the conclusion.
        let left = Sequent::new(vec![truth(Formula::var("S"))], truth(Formula::var("P")));
        let right = Sequent::new(vec![truth(Formula::var("P"))], goal);
        let pf = Proof::new(
            vec![Premise::Open(left), Premise::Open(right)],
            conclusion.clone(),
            &CUT,
        );
        assert_eq!(verify(&pf), vec![conclusion]);
    }

    #[test]
    fn weaken_drops_one_assumption() {
        let conclusion = Sequent::new(
            vec![truth(Formula::var("P")), truth(Formula::var("Q"))],
            truth(Formula::var("R")),
        );
        let premise = Sequent::new(vec![truth(Formula::var("Q"))], truth(Formula::var("R")));
        let pf = Proof::new(vec![Premise::Open(premise.clone())], conclusion, &WEAKEN);
        assert_eq!(verify(&pf), vec![premise]);
    }

    #[test]
    fn imp_left_checks_right_premise_additions() {
        let imp = Formula::implies(Formula::var("P"), Formula::var("Q"));
        let conclusion = Sequent::new(
            vec![truth(imp.clone()), truth(Formula::var("P"))],
            truth(Formula::var("Q")),
        );
        // Right premise assumes Q, which is justified by P -> Q in context.
        let left = Sequent::new(
            vec![truth(imp.clone()), truth(Formula::var("P"))],
            truth(Formula::var("P")),
        );
        let right = Sequent::new(
            vec![
                truth(imp),
                truth(Formula::var("P")),
                truth(Formula::var("Q")),
            ],
            truth(Formula::var("Q")),
        );
        let pf = Proof::new(
            vec![Premise::Open(left.clone()), Premise::Open(right.clone())],
            conclusion,
            &IMP_LEFT,
        );
        assert_eq!(verify(&pf), vec![left, right]);
    }

    #[test]
    fn sign_requires_matching_key() {
        let gamma = vec![
            truth(Formula::iskey(Formula::agent("#a"), Formula::key("[k1]"))),
            truth(Formula::sign(Formula::var("P"), Formula::key("[k2]"))),
        ];
        let conclusion = Sequent::new(
            gamma.clone(),
            truth(Formula::says(Formula::agent("#a"), Formula::var("P"))),
        );
        let left = Sequent::new(
            gamma.clone(),
            truth(Formula::iskey(Formula::agent("#a"), Formula::key("[k1]"))),
        );
        let right = Sequent::new(
            gamma,
            truth(Formula::sign(Formula::var("P"), Formula::key("[k2]"))),
        );
        let pf = Proof::new(
            vec![Premise::Open(left), Premise::Open(right)],
            conclusion.clone(),
            &SIGN,
        );
        // Keys [k1] and [k2] disagree: the step is illegal.
        assert_eq!(verify(&pf), vec![conclusion]);
    }

    #[test]
    fn forall_left_checks_instantiation() {
        let x = Variable("x".to_string());
        let body = Formula::open(Formula::var("x"), Formula::resource("<r>"));
        let quantified = truth(Formula::forall(x, body.clone()));
        let mut sub = Substitution::new();
        sub.insert(Variable("x".to_string()), Formula::agent("#a"));
        let instance = truth(body.apply(&sub));
        let goal = truth(Formula::var("Q"));
        let conclusion = Sequent::new(vec![quantified.clone(), goal.clone()], goal.clone());
        let premise = Sequent::new(vec![instance, goal.clone()], goal);
        let pf = Proof::new(
            vec![Premise::Open(premise.clone())],
            conclusion,
            &FORALL_LEFT,
        );
        assert_eq!(verify(&pf), vec![premise]);
    }

    #[test]
    fn says_left_admits_only_said_assumptions() {
        let speaker = Speaker::Agent(Agent("#a".to_string()));
        let said = Formula::open(Formula::agent("#b"), Formula::resource("<r>"));
        let says = Formula::says(Formula::agent("#a"), said.clone());
        let delta = Judgement::aff(speaker, Formula::var("Q"));
        let conclusion = Sequent::new(vec![truth(says.clone())], delta.clone());
        let premise = Sequent::new(vec![truth(says), truth(said)], delta);
        let pf = Proof::new(
            vec![Premise::Open(premise.clone())],
            conclusion,
            &crate::rules::SAYS_LEFT,
        );
        assert_eq!(verify(&pf), vec![premise]);
    }
}
