//! The fixed inference-rule catalog of the authorization calculus
//!
//! Rule bodies use variables as schematic meta-variables; `RuleTactic`
//! instantiates them by matching a rule's conclusion against a goal
//! sequent, and the verifier dispatches on `Rule::name`. The catalog is
//! closed: wire decoding rejects any name not present here.

#![forbid(unsafe_code)]
#![allow(missing_docs)]

use std::collections::HashMap;
use std::sync::LazyLock;

use crate::logic::{Formula, Judgement, Rule, Sequent, Speaker, Variable};

fn v(id: &str) -> Formula {
    Formula::var(id)
}

fn t(p: Formula) -> Judgement {
    Judgement::truth(p)
}

fn aff(speaker: &str, p: Formula) -> Judgement {
    Judgement::aff(Speaker::Var(Variable(speaker.to_string())), p)
}

fn seq(gamma: Vec<Judgement>, delta: Judgement) -> Sequent {
    Sequent::new(gamma, delta)
}

fn x() -> Variable {
    Variable("x".to_string())
}

/// `P true ⊢ P true`
pub static IDENTITY: LazyLock<Rule> = LazyLock::new(|| Rule {
    premises: vec![],
    conclusion: seq(vec![t(v("P"))], t(v("P"))),
    name: "id",
});

/// `false true ⊢ P true`
pub static FALSE_LEFT: LazyLock<Rule> = LazyLock::new(|| Rule {
    premises: vec![],
    conclusion: seq(vec![t(Formula::falsity())], t(v("P"))),
    name: "botL",
});

/// `P true ⊢ Q true` yields `⊢ P -> Q true`
pub static IMP_RIGHT: LazyLock<Rule> = LazyLock::new(|| Rule {
    premises: vec![seq(vec![t(v("P"))], t(v("Q")))],
    conclusion: seq(vec![], t(Formula::implies(v("P"), v("Q")))),
    name: "->R",
});

/// `⊢ P true` and `Q true ⊢ R true` yield `P -> Q true ⊢ R true`
pub static IMP_LEFT: LazyLock<Rule> = LazyLock::new(|| Rule {
    premises: vec![
        seq(vec![], t(v("P"))),
        seq(vec![t(v("Q"))], t(v("R"))),
    ],
    conclusion: seq(vec![t(Formula::implies(v("P"), v("Q")))], t(v("R"))),
    name: "->L",
});

/// Affirmation-goal variant of `->L`.
pub static IMP_LEFT_AFF: LazyLock<Rule> = LazyLock::new(|| Rule {
    premises: vec![
        seq(vec![], t(v("P"))),
        seq(vec![t(v("Q"))], aff("A", v("R"))),
    ],
    conclusion: seq(vec![t(Formula::implies(v("P"), v("Q")))], aff("A", v("R"))),
    name: "->Laff",
});

/// `⊢ P(y)` yields `⊢ @x . P(x)` (with `y` fresh).
pub static FORALL_RIGHT: LazyLock<Rule> = LazyLock::new(|| Rule {
    premises: vec![seq(vec![], t(Formula::template(v("P"), v("y"))))],
    conclusion: seq(
        vec![],
        t(Formula::forall(x(), Formula::template(v("P"), Formula::var("x")))),
    ),
    name: "@R",
});

/// `P(e) ⊢ Q` yields `@x . P(x) ⊢ Q`
pub static FORALL_LEFT: LazyLock<Rule> = LazyLock::new(|| Rule {
    premises: vec![seq(vec![t(Formula::template(v("P"), v("e")))], t(v("Q")))],
    conclusion: seq(
        vec![t(Formula::forall(x(), Formula::template(v("P"), Formula::var("x"))))],
        t(v("Q")),
    ),
    name: "@L",
});

/// Affirmation-goal variant of `@L`.
pub static FORALL_LEFT_AFF: LazyLock<Rule> = LazyLock::new(|| Rule {
    premises: vec![seq(
        vec![t(Formula::template(v("P"), v("e")))],
        aff("A", v("Q")),
    )],
    conclusion: seq(
        vec![t(Formula::forall(x(), Formula::template(v("P"), Formula::var("x"))))],
        aff("A", v("Q")),
    ),
    name: "@Laff",
});

/// `Q true ⊢ R true` yields `P true, Q true ⊢ R true`
pub static WEAKEN: LazyLock<Rule> = LazyLock::new(|| Rule {
    premises: vec![seq(vec![t(v("Q"))], t(v("R")))],
    conclusion: seq(vec![t(v("P")), t(v("Q"))], t(v("R"))),
    name: "W",
});

/// `⊢ P true` and `P true ⊢ Q true` yield `⊢ Q true`
pub static CUT: LazyLock<Rule> = LazyLock::new(|| Rule {
    premises: vec![
        seq(vec![], t(v("P"))),
        seq(vec![t(v("P"))], t(v("Q"))),
    ],
    conclusion: seq(vec![], t(v("Q"))),
    name: "cut",
});

/// Affirmation-goal variant of `cut`.
pub static AFF_CUT: LazyLock<Rule> = LazyLock::new(|| Rule {
    premises: vec![
        seq(vec![], t(v("P"))),
        seq(vec![t(v("P"))], aff("A", v("Q"))),
    ],
    conclusion: seq(vec![], aff("A", v("Q"))),
    name: "affcut",
});

/// `⊢ P true` yields `⊢ A aff P`
pub static AFF: LazyLock<Rule> = LazyLock::new(|| Rule {
    premises: vec![seq(vec![], t(v("P")))],
    conclusion: seq(vec![], aff("A", v("P"))),
    name: "aff",
});

/// `P true ⊢ A aff Q` yields `A says P true ⊢ A aff Q`
pub static SAYS_LEFT: LazyLock<Rule> = LazyLock::new(|| Rule {
    premises: vec![seq(vec![t(v("P"))], aff("A", v("Q")))],
    conclusion: seq(
        vec![t(Formula::says(v("A"), v("P")))],
        aff("A", v("Q")),
    ),
    name: "saysL",
});

/// `⊢ A aff P` yields `⊢ A says P true`
pub static SAYS_RIGHT: LazyLock<Rule> = LazyLock::new(|| Rule {
    premises: vec![seq(vec![], aff("A", v("P")))],
    conclusion: seq(vec![], t(Formula::says(v("A"), v("P")))),
    name: "saysR",
});

/// `⊢ iskey(A, pk) true` and `⊢ sign(P, pk) true` yield `⊢ A says P true`
pub static SIGN: LazyLock<Rule> = LazyLock::new(|| Rule {
    premises: vec![
        seq(vec![], t(Formula::iskey(v("A"), v("pk")))),
        seq(vec![], t(Formula::sign(v("P"), v("pk")))),
    ],
    conclusion: seq(vec![], t(Formula::says(v("A"), v("P")))),
    name: "sign",
});

/// `⊢ ca(A) true` and `⊢ A says iskey(B, pk) true` yield `⊢ iskey(B, pk) true`
pub static CERT: LazyLock<Rule> = LazyLock::new(|| Rule {
    premises: vec![
        seq(vec![], t(Formula::ca(v("A")))),
        seq(
            vec![],
            t(Formula::says(v("A"), Formula::iskey(v("B"), v("pk")))),
        ),
    ],
    conclusion: seq(vec![], t(Formula::iskey(v("B"), v("pk")))),
    name: "cert",
});

static CALCULUS: LazyLock<HashMap<&'static str, &'static Rule>> = LazyLock::new(|| {
    let rules: [&'static Rule; 16] = [
        &IDENTITY,
        &FALSE_LEFT,
        &IMP_RIGHT,
        &IMP_LEFT,
        &IMP_LEFT_AFF,
        &FORALL_RIGHT,
        &FORALL_LEFT,
        &FORALL_LEFT_AFF,
        &WEAKEN,
        &CUT,
        &AFF_CUT,
        &AFF,
        &SAYS_LEFT,
        &SAYS_RIGHT,
        &SIGN,
        &CERT,
    ];
    rules.into_iter().map(|r| (r.name, r)).collect()
});

/// The full catalog, keyed by rule name.
pub fn calculus() -> &'static HashMap<&'static str, &'static Rule> {
    &CALCULUS
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catalog_is_complete_and_keyed_by_name() {
        let cal = calculus();
        assert_eq!(cal.len(), 16);
        for name in [
            "id", "botL", "->R", "->L", "->Laff", "@R", "@L", "@Laff", "W", "cut",
            "affcut", "aff", "saysL", "saysR", "sign", "cert",
        ] {
            let rule = cal.get(name).expect(name);
            assert_eq!(rule.name, name);
        }
    }

    #[test]
    fn zero_premise_rules() {
        assert!(IDENTITY.premises.is_empty());
        assert!(FALSE_LEFT.premises.is_empty());
        assert_eq!(IMP_LEFT.premises.len(), 2);
        assert_eq!(SIGN.premises.len(), 2);
    }
}
