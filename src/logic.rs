//! Term, judgement, sequent, and proof model for the authorization logic
//!
//! Everything here is an immutable value type: formulas and proofs are
//! acyclic trees with structural equality and order-sensitive hashing, and
//! substitution produces fresh values rather than mutating in place. The
//! matcher, verifier, and tactics all build on this module.
//!
//! Name sorts are kept disjoint (`Variable`, `Agent`, `Key`, `Resource`)
//! but share the single `Formula` enum so that dispatch in the matcher is
//! total without any runtime reflection.

#![forbid(unsafe_code)]
#![allow(missing_docs)]

use std::collections::{HashMap, HashSet};

// ============================================================================
// Atoms
// ============================================================================

/// Logical placeholder, bindable by substitution.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Variable(pub String);

/// Principal identifier; ids carry the `#` prefix verbatim.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Agent(pub String);

/// Public-key fingerprint; ids carry the surrounding brackets verbatim.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Key(pub String);

/// Resource identifier; ids carry the surrounding angle brackets verbatim.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Resource(pub String);

/// Connectives and predicates of the logic. `Other` is the template
/// application form `P(x)` used only inside quantifier rule schemas.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Operator {
    Not,
    And,
    Or,
    Implies,
    True,
    False,
    Says,
    IsKey,
    Sign,
    IsCa,
    Open,
    Other,
}

// ============================================================================
// Formulas
// ============================================================================

/// A formula of the logic. Application argument counts are fixed by the
/// operator; the constructors below maintain that invariant.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Formula {
    Var(Variable),
    Agent(Agent),
    Key(Key),
    Resource(Resource),
    App(Operator, Vec<Formula>),
    Forall(Variable, Box<Formula>),
}

/// Mapping from variables to the formulas they stand for.
pub type Substitution = HashMap<Variable, Formula>;

impl Formula {
    pub fn var(id: &str) -> Formula {
        Formula::Var(Variable(id.to_string()))
    }

    pub fn agent(id: &str) -> Formula {
        Formula::Agent(Agent(id.to_string()))
    }

    pub fn key(id: &str) -> Formula {
        Formula::Key(Key(id.to_string()))
    }

    pub fn resource(id: &str) -> Formula {
        Formula::Resource(Resource(id.to_string()))
    }

    pub fn truth() -> Formula {
        Formula::App(Operator::True, vec![])
    }

    pub fn falsity() -> Formula {
        Formula::App(Operator::False, vec![])
    }

    pub fn not(p: Formula) -> Formula {
        Formula::App(Operator::Not, vec![p])
    }

    pub fn and(p: Formula, q: Formula) -> Formula {
        Formula::App(Operator::And, vec![p, q])
    }

    pub fn or(p: Formula, q: Formula) -> Formula {
        Formula::App(Operator::Or, vec![p, q])
    }

    pub fn implies(p: Formula, q: Formula) -> Formula {
        Formula::App(Operator::Implies, vec![p, q])
    }

    /// `a says p`; `a` must be an agent or variable.
    pub fn says(a: Formula, p: Formula) -> Formula {
        Formula::App(Operator::Says, vec![a, p])
    }

    /// `iskey(a, k)`: the public key fingerprinted by `k` belongs to `a`.
    pub fn iskey(a: Formula, k: Formula) -> Formula {
        Formula::App(Operator::IsKey, vec![a, k])
    }

    /// `sign(p, k)`: `p` carries a valid signature under the key `k`.
    pub fn sign(p: Formula, k: Formula) -> Formula {
        Formula::App(Operator::Sign, vec![p, k])
    }

    /// `ca(a)`: `a` is a certificate authority.
    pub fn ca(a: Formula) -> Formula {
        Formula::App(Operator::IsCa, vec![a])
    }

    /// `open(a, r)`: `a` may open the resource `r`.
    pub fn open(a: Formula, r: Formula) -> Formula {
        Formula::App(Operator::Open, vec![a, r])
    }

    /// Template application `p(x)`, for quantifier rule schemas only.
    pub fn template(p: Formula, x: Formula) -> Formula {
        Formula::App(Operator::Other, vec![p, x])
    }

    pub fn forall(x: Variable, body: Formula) -> Formula {
        Formula::Forall(x, Box::new(body))
    }

    /// Apply a substitution, replacing bound variables with their images.
    /// Template applications resolve to the image of their predicate hole;
    /// quantifiers shadow their bound variable.
    pub fn apply(&self, rho: &Substitution) -> Formula {
        match self {
            Formula::Var(x) => rho.get(x).cloned().unwrap_or_else(|| self.clone()),
            Formula::App(Operator::Other, args) => match args.first() {
                Some(head) => head.apply(rho),
                None => self.clone(),
            },
            Formula::App(op, args) => {
                Formula::App(*op, args.iter().map(|a| a.apply(rho)).collect())
            }
            Formula::Forall(x, p) => {
                let mut inner = rho.clone();
                inner.remove(x);
                Formula::Forall(x.clone(), Box::new(p.apply(&inner)))
            }
            _ => self.clone(),
        }
    }

    /// All variables occurring in the formula, quantified ones excluded.
    pub fn vars(&self) -> HashSet<Variable> {
        let mut out = HashSet::new();
        self.collect_vars(&mut out);
        out
    }

    fn collect_vars(&self, out: &mut HashSet<Variable>) {
        match self {
            Formula::Var(x) => {
                out.insert(x.clone());
            }
            Formula::App(_, args) => {
                for a in args {
                    a.collect_vars(out);
                }
            }
            Formula::Forall(x, p) => {
                let mut inner = HashSet::new();
                p.collect_vars(&mut inner);
                inner.remove(x);
                out.extend(inner);
            }
            _ => {}
        }
    }

    /// Terms in key position (`iskey`/`sign` second argument, plus bare key
    /// atoms). The result may contain variables when a schema is scanned.
    pub fn keys(&self) -> HashSet<Formula> {
        let mut out = HashSet::new();
        self.collect_keys(&mut out);
        out
    }

    fn collect_keys(&self, out: &mut HashSet<Formula>) {
        match self {
            Formula::Key(_) => {
                out.insert(self.clone());
            }
            Formula::App(Operator::IsKey, args) => {
                if let Some(k) = args.get(1) {
                    out.insert(k.clone());
                }
            }
            Formula::App(Operator::Sign, args) => {
                if let Some(k) = args.get(1) {
                    out.insert(k.clone());
                }
                if let Some(p) = args.first() {
                    p.collect_keys(out);
                }
            }
            Formula::App(_, args) => {
                for a in args {
                    a.collect_keys(out);
                }
            }
            Formula::Forall(_, p) => p.collect_keys(out),
            _ => {}
        }
    }

    /// Terms in agent position. May contain variables for schemas.
    pub fn agents(&self) -> HashSet<Formula> {
        let mut out = HashSet::new();
        self.collect_agents(&mut out);
        out
    }

    fn collect_agents(&self, out: &mut HashSet<Formula>) {
        match self {
            Formula::Agent(_) => {
                out.insert(self.clone());
            }
            Formula::App(Operator::IsKey, args) | Formula::App(Operator::Open, args) => {
                if let Some(a) = args.first() {
                    out.insert(a.clone());
                }
            }
            Formula::App(Operator::Says, args) => {
                if let Some(a) = args.first() {
                    out.insert(a.clone());
                }
                if let Some(p) = args.get(1) {
                    p.collect_agents(out);
                }
            }
            Formula::App(Operator::Sign, args) => {
                if let Some(p) = args.first() {
                    p.collect_agents(out);
                }
            }
            Formula::App(_, args) => {
                for a in args {
                    a.collect_agents(out);
                }
            }
            Formula::Forall(_, p) => p.collect_agents(out),
            _ => {}
        }
    }

    /// Terms in resource position. May contain variables for schemas.
    pub fn resources(&self) -> HashSet<Formula> {
        let mut out = HashSet::new();
        self.collect_resources(&mut out);
        out
    }

    fn collect_resources(&self, out: &mut HashSet<Formula>) {
        match self {
            Formula::Resource(_) => {
                out.insert(self.clone());
            }
            Formula::App(Operator::Says, args) => {
                if let Some(p) = args.get(1) {
                    p.collect_resources(out);
                }
            }
            Formula::App(Operator::Open, args) => {
                if let Some(r) = args.get(1) {
                    out.insert(r.clone());
                }
            }
            Formula::App(Operator::Sign, args) => {
                if let Some(p) = args.first() {
                    p.collect_resources(out);
                }
            }
            Formula::App(_, args) => {
                for a in args {
                    a.collect_resources(out);
                }
            }
            Formula::Forall(_, p) => p.collect_resources(out),
            _ => {}
        }
    }
}

/// A variable with the given prefix that does not occur in `taken`.
pub fn fresh_var(taken: &HashSet<Variable>, prefix: &str) -> Variable {
    let mut i = 0usize;
    loop {
        let candidate = Variable(format!("{prefix}{i}"));
        if !taken.contains(&candidate) {
            return candidate;
        }
        i += 1;
    }
}

// ============================================================================
// Judgements and sequents
// ============================================================================

/// The subject of an affirmation: a concrete agent, or a schema variable.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Speaker {
    Agent(Agent),
    Var(Variable),
}

impl Speaker {
    /// The speaker as a formula atom, for use in `says` applications and
    /// substitution bindings.
    pub fn as_formula(&self) -> Formula {
        match self {
            Speaker::Agent(a) => Formula::Agent(a.clone()),
            Speaker::Var(x) => Formula::Var(x.clone()),
        }
    }

    pub fn id(&self) -> &str {
        match self {
            Speaker::Agent(a) => &a.0,
            Speaker::Var(x) => &x.0,
        }
    }
}

/// `P true` or `A aff P`.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Judgement {
    Proposition(Formula),
    Affirmation(Speaker, Formula),
}

impl Judgement {
    pub fn truth(p: Formula) -> Judgement {
        Judgement::Proposition(p)
    }

    pub fn aff(a: Speaker, p: Formula) -> Judgement {
        Judgement::Affirmation(a, p)
    }

    /// The enclosed formula, for either judgement form.
    pub fn formula(&self) -> &Formula {
        match self {
            Judgement::Proposition(p) => p,
            Judgement::Affirmation(_, p) => p,
        }
    }

    pub fn apply(&self, rho: &Substitution) -> Judgement {
        match self {
            Judgement::Proposition(p) => Judgement::Proposition(p.apply(rho)),
            Judgement::Affirmation(a, p) => {
                let a = match a {
                    Speaker::Var(x) => match rho.get(x) {
                        Some(Formula::Agent(ag)) => Speaker::Agent(ag.clone()),
                        Some(Formula::Var(v)) => Speaker::Var(v.clone()),
                        _ => a.clone(),
                    },
                    Speaker::Agent(_) => a.clone(),
                };
                Judgement::Affirmation(a, p.apply(rho))
            }
        }
    }

    pub fn vars(&self) -> HashSet<Variable> {
        let mut out = match self {
            Judgement::Affirmation(Speaker::Var(x), _) => HashSet::from([x.clone()]),
            _ => HashSet::new(),
        };
        out.extend(self.formula().vars());
        out
    }
}

/// `Γ ⊢ Δ`: the goal `delta` under the assumption multiset `gamma`.
///
/// `gamma` is carried as a list; duplicates are tolerated and comparisons
/// that the calculus requires to be order-insensitive are done over sets of
/// judgements at the point of use.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Sequent {
    pub gamma: Vec<Judgement>,
    pub delta: Judgement,
}

impl Sequent {
    pub fn new(gamma: Vec<Judgement>, delta: Judgement) -> Sequent {
        Sequent { gamma, delta }
    }

    pub fn apply(&self, rho: &Substitution) -> Sequent {
        Sequent {
            gamma: self.gamma.iter().map(|j| j.apply(rho)).collect(),
            delta: self.delta.apply(rho),
        }
    }

    pub fn vars(&self) -> HashSet<Variable> {
        let mut out = self.delta.vars();
        for j in &self.gamma {
            out.extend(j.vars());
        }
        out
    }

    pub fn keys(&self) -> HashSet<Formula> {
        let mut out = self.delta.formula().keys();
        for j in &self.gamma {
            out.extend(j.formula().keys());
        }
        out
    }
}

// ============================================================================
// Rules and proofs
// ============================================================================

/// An inference rule schema. The premises and conclusion may contain
/// variables acting as schematic meta-variables; `name` is the key used by
/// the verifier dispatch and the wire format.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Rule {
    pub premises: Vec<Sequent>,
    pub conclusion: Sequent,
    pub name: &'static str,
}

/// One premise slot of a proof node: either a completed sub-proof or an
/// open obligation still to be discharged.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Premise {
    Proved(Proof),
    Open(Sequent),
}

impl Premise {
    pub fn gamma(&self) -> &[Judgement] {
        match self {
            Premise::Proved(p) => &p.conclusion.gamma,
            Premise::Open(s) => &s.gamma,
        }
    }

    pub fn delta(&self) -> &Judgement {
        match self {
            Premise::Proved(p) => &p.conclusion.delta,
            Premise::Open(s) => &s.delta,
        }
    }
}

/// A tree of rule applications. A proof is *closed* when walking it with
/// the verifier yields no open obligations.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Proof {
    pub premises: Vec<Premise>,
    pub conclusion: Sequent,
    pub rule: &'static Rule,
}

impl Proof {
    pub fn new(premises: Vec<Premise>, conclusion: Sequent, rule: &'static Rule) -> Proof {
        Proof { premises, conclusion, rule }
    }

    pub fn vars(&self) -> HashSet<Variable> {
        let mut out = self.conclusion.vars();
        for prem in &self.premises {
            match prem {
                Premise::Proved(p) => out.extend(p.vars()),
                Premise::Open(s) => out.extend(s.vars()),
            }
        }
        out
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn rho(bindings: &[(&str, Formula)]) -> Substitution {
        bindings
            .iter()
            .map(|(x, f)| (Variable(x.to_string()), f.clone()))
            .collect()
    }

    #[test]
    fn apply_replaces_bound_variables() {
        let p = Formula::implies(Formula::var("P"), Formula::var("Q"));
        let s = rho(&[("P", Formula::agent("#a")), ("Q", Formula::truth())]);
        assert_eq!(
            p.apply(&s),
            Formula::implies(Formula::agent("#a"), Formula::truth())
        );
    }

    #[test]
    fn apply_is_idempotent_on_its_own_domain() {
        // Invariant: apply(apply(F, rho), rho) == apply(F, rho) whenever the
        // images contain no variables from rho's domain.
        let f = Formula::says(
            Formula::var("A"),
            Formula::open(Formula::var("B"), Formula::resource("<r>")),
        );
        let s = rho(&[
            ("A", Formula::agent("#root")),
            ("B", Formula::agent("#alice")),
        ]);
        let once = f.apply(&s);
        assert_eq!(once.apply(&s), once);
    }

    #[test]
    fn apply_shadows_quantified_variable() {
        let x = Variable("x".to_string());
        let body = Formula::open(Formula::var("x"), Formula::var("r"));
        let f = Formula::forall(x.clone(), body.clone());
        let s = rho(&[
            ("x", Formula::agent("#a")),
            ("r", Formula::resource("<f>")),
        ]);
        let expect = Formula::forall(
            x,
            Formula::open(Formula::var("x"), Formula::resource("<f>")),
        );
        assert_eq!(f.apply(&s), expect);
    }

    #[test]
    fn vars_excludes_quantified() {
        let f = Formula::forall(
            Variable("x".to_string()),
            Formula::open(Formula::var("x"), Formula::var("r")),
        );
        assert_eq!(f.vars(), HashSet::from([Variable("r".to_string())]));
    }

    #[test]
    fn keys_found_in_sign_and_iskey_position() {
        let f = Formula::sign(
            Formula::iskey(Formula::agent("#a"), Formula::key("[k1]")),
            Formula::key("[k2]"),
        );
        let keys = f.keys();
        assert!(keys.contains(&Formula::key("[k1]")));
        assert!(keys.contains(&Formula::key("[k2]")));
    }

    #[test]
    fn agents_and_resources_found_in_grant() {
        let f = Formula::says(
            Formula::agent("#root"),
            Formula::open(Formula::agent("#b"), Formula::resource("<r>")),
        );
        assert!(f.agents().contains(&Formula::agent("#root")));
        assert!(f.agents().contains(&Formula::agent("#b")));
        assert_eq!(f.resources(), HashSet::from([Formula::resource("<r>")]));
    }

    #[test]
    fn fresh_var_avoids_taken_names() {
        let taken = HashSet::from([Variable("v0".to_string()), Variable("v1".to_string())]);
        assert_eq!(fresh_var(&taken, "v"), Variable("v2".to_string()));
    }

    #[test]
    fn affirmation_speaker_substitution() {
        let j = Judgement::aff(
            Speaker::Var(Variable("A".to_string())),
            Formula::var("P"),
        );
        let s = rho(&[("A", Formula::agent("#a")), ("P", Formula::truth())]);
        assert_eq!(
            j.apply(&s),
            Judgement::aff(Speaker::Agent(Agent("#a".to_string())), Formula::truth())
        );
    }
}
