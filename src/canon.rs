//! Canonical textual encoding of formulas, judgements, and sequents
//!
//! This is the signature-covered form: credential signatures are computed
//! over the UTF-8 bytes of exactly these strings, and the wire format
//! embeds sequents in this encoding. The rendering is a deterministic
//! structural recursion; any change here invalidates existing signatures.
//!
//! The grammar is round-tripped by [`crate::parse`].

#![forbid(unsafe_code)]

use std::fmt;

use crate::logic::{Formula, Judgement, Operator, Sequent, Speaker, Substitution};

impl fmt::Display for Formula {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Formula::Var(x) => write!(f, "{}", x.0),
            Formula::Agent(a) => write!(f, "{}", a.0),
            Formula::Key(k) => write!(f, "{}", k.0),
            Formula::Resource(r) => write!(f, "{}", r.0),
            Formula::App(op, args) => match (op, args.as_slice()) {
                (Operator::True, []) => write!(f, "true"),
                (Operator::False, []) => write!(f, "false"),
                (Operator::Not, [p]) => write!(f, "!({p})"),
                (Operator::IsCa, [a]) => write!(f, "ca({a})"),
                // The inner parentheses around the signed statement are part
                // of the canonical form.
                (Operator::Sign, [p, k]) => write!(f, "sign(({p}), {k})"),
                (Operator::IsKey, [a, k]) => write!(f, "iskey({a}, {k})"),
                (Operator::Open, [a, r]) => write!(f, "open({a}, {r})"),
                (Operator::Other, [p, x]) => write!(f, "{p}({x})"),
                (Operator::And, [l, r]) => write!(f, "({l} & {r})"),
                (Operator::Or, [l, r]) => write!(f, "({l} | {r})"),
                (Operator::Implies, [l, r]) => write!(f, "({l} -> {r})"),
                (Operator::Says, [l, r]) => write!(f, "({l} says {r})"),
                // Unreachable for applications built via the constructors;
                // render something greppable rather than panic in Display.
                (op, args) => {
                    write!(f, "{op:?}(")?;
                    for (i, a) in args.iter().enumerate() {
                        if i > 0 {
                            write!(f, ", ")?;
                        }
                        write!(f, "{a}")?;
                    }
                    write!(f, ")")
                }
            },
            Formula::Forall(x, p) => write!(f, "(@{} . ({}))", x.0, p),
        }
    }
}

impl fmt::Display for Speaker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.id())
    }
}

impl fmt::Display for Judgement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Judgement::Proposition(p) => write!(f, "{p} true"),
            Judgement::Affirmation(a, p) => write!(f, "{a} aff {p}"),
        }
    }
}

impl fmt::Display for Sequent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let gamma = self
            .gamma
            .iter()
            .map(|j| j.to_string())
            .collect::<Vec<_>>()
            .join(", ");
        write!(f, "{gamma} |- {}", self.delta)
    }
}

/// Render a substitution for diagnostics, e.g. `P => open(#a, <r>), x => #a`.
pub fn subst_to_string(rho: &Substitution) -> String {
    let mut entries: Vec<_> = rho.iter().collect();
    entries.sort_by(|a, b| a.0.cmp(b.0));
    entries
        .iter()
        .map(|(x, q)| format!("{} => {}", x.0, q))
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logic::Variable;

    #[test]
    fn atoms_render_verbatim() {
        assert_eq!(Formula::agent("#root").to_string(), "#root");
        assert_eq!(Formula::key("[ab:cd]").to_string(), "[ab:cd]");
        assert_eq!(Formula::resource("<shared.txt>").to_string(), "<shared.txt>");
        assert_eq!(Formula::var("P").to_string(), "P");
    }

    #[test]
    fn connectives_render_infix_with_parens() {
        let p = Formula::implies(Formula::var("P"), Formula::var("Q"));
        assert_eq!(p.to_string(), "(P -> Q)");
        let s = Formula::says(Formula::agent("#a"), Formula::var("P"));
        assert_eq!(s.to_string(), "(#a says P)");
        assert_eq!(
            Formula::and(Formula::truth(), Formula::falsity()).to_string(),
            "(true & false)"
        );
    }

    #[test]
    fn sign_keeps_inner_parens() {
        let p = Formula::sign(
            Formula::open(Formula::agent("#b"), Formula::resource("<r>")),
            Formula::key("[k]"),
        );
        assert_eq!(p.to_string(), "sign((open(#b, <r>)), [k])");
    }

    #[test]
    fn forall_renders_bound_body() {
        let p = Formula::forall(
            Variable("x".to_string()),
            Formula::open(Formula::var("x"), Formula::resource("<r>")),
        );
        assert_eq!(p.to_string(), "(@x . (open(x, <r>)))");
    }

    #[test]
    fn substitution_rendering_is_sorted() {
        let mut rho = Substitution::new();
        rho.insert(Variable("x".to_string()), Formula::agent("#a"));
        rho.insert(Variable("P".to_string()), Formula::truth());
        assert_eq!(subst_to_string(&rho), "P => true, x => #a");
    }

    #[test]
    fn judgement_and_sequent_forms() {
        let j = Judgement::truth(Formula::var("P"));
        assert_eq!(j.to_string(), "P true");
        let seq = Sequent::new(
            vec![Judgement::truth(Formula::var("P"))],
            Judgement::truth(Formula::var("P")),
        );
        assert_eq!(seq.to_string(), "P true |- P true");
        // An empty context still renders the turnstile separator.
        let empty = Sequent::new(vec![], Judgement::truth(Formula::var("P")));
        assert_eq!(empty.to_string(), " |- P true");
    }
}
