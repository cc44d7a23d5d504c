//! Queries over the assumption context of a sequent
//!
//! The request pipeline and the authorization driver both need to answer
//! questions like "which agents are certificate authorities here", "does
//! this key belong to that agent", and "is there a credential for this
//! formula" — all purely in terms of the `ca`, `iskey`, and `sign`
//! assumptions in scope.

#![forbid(unsafe_code)]

use std::collections::HashSet;

use crate::logic::{Agent, Formula, Judgement, Key, Operator, Sequent};

/// Agents declared as certificate authorities (`ca(A)` assumptions), in
/// first-occurrence order.
pub fn get_cas(seq: &Sequent) -> Vec<Agent> {
    let mut out = Vec::new();
    for j in &seq.gamma {
        if let Judgement::Proposition(Formula::App(Operator::IsCa, args)) = j {
            if let Some(Formula::Agent(a)) = args.first() {
                if !out.contains(a) {
                    out.push(a.clone());
                }
            }
        }
    }
    out
}

/// Whether `k` belongs to a certificate authority: the context must bind
/// `k` to an agent via `iskey` and declare that agent with `ca`. With a
/// specific `ca` given, the binding must name exactly that agent.
pub fn is_ca_key(k: &Key, seq: &Sequent, ca: Option<&Agent>) -> bool {
    for j in &seq.gamma {
        let Judgement::Proposition(Formula::App(Operator::IsKey, args)) = j else {
            continue;
        };
        let (Some(Formula::Agent(ag)), Some(Formula::Key(pk))) = (args.first(), args.get(1))
        else {
            continue;
        };
        if pk != k {
            continue;
        }
        match ca {
            None => {
                let declared =
                    Judgement::truth(Formula::ca(Formula::Agent(ag.clone())));
                if seq.gamma.contains(&declared) {
                    return true;
                }
            }
            Some(c) => {
                if ag == c {
                    return true;
                }
            }
        }
    }
    false
}

/// Keys in the context that belong to certificate authorities; restricted
/// to one authority when `ca` is given.
pub fn get_ca_keys(seq: &Sequent, ca: Option<&Agent>) -> HashSet<Key> {
    seq.keys()
        .into_iter()
        .filter_map(|f| match f {
            Formula::Key(k) => Some(k),
            _ => None,
        })
        .filter(|k| is_ca_key(k, seq, ca))
        .collect()
}

/// Whether the context establishes that `k` belongs to `a`, either through
/// a direct `iskey` assumption or through a certificate credential
/// `sign(iskey(a, k), ck)` signed with a certificate authority's key.
pub fn is_key(k: &Key, a: &Agent, seq: &Sequent) -> bool {
    for j in &seq.gamma {
        match j.formula() {
            Formula::App(Operator::Sign, args) => {
                let (Some(Formula::App(Operator::IsKey, inner)), Some(Formula::Key(ck))) =
                    (args.first(), args.get(1))
                else {
                    continue;
                };
                let (Some(Formula::Agent(ag)), Some(Formula::Key(pk))) =
                    (inner.first(), inner.get(1))
                else {
                    continue;
                };
                if ag == a && pk == k && is_ca_key(ck, seq, None) {
                    return true;
                }
            }
            Formula::App(Operator::IsKey, args) => {
                let (Some(Formula::Agent(ag)), Some(Formula::Key(pk))) =
                    (args.first(), args.get(1))
                else {
                    continue;
                };
                if ag == a && pk == k {
                    return true;
                }
            }
            _ => {}
        }
    }
    false
}

/// Whether `cred` is `sign(p, k)` for a key the context binds to `a`.
pub fn is_credential(cred: &Formula, a: &Agent, p: &Formula, seq: &Sequent) -> bool {
    let Formula::App(Operator::Sign, args) = cred else {
        return false;
    };
    let (Some(q), Some(Formula::Key(k))) = (args.first(), args.get(1)) else {
        return false;
    };
    q == p && is_key(k, a, seq)
}

/// The `sign(p, k)` assumption issued by `a` over `p`, if the context
/// carries one.
pub fn has_credential<'a>(a: &Agent, p: &Formula, seq: &'a Sequent) -> Option<&'a Formula> {
    seq.gamma
        .iter()
        .map(|j| j.formula())
        .find(|q| is_credential(q, a, p, seq))
}
