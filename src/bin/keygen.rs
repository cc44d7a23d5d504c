//! Key, certificate, and credential generation
//!
//! Two modes:
//!
//! `keygen user --agent NAME [--signator NAME] [--store DIR]`
//!   Generate a fresh Ed25519 keypair for NAME, write the private key to
//!   private_keys/ and a certificate to certs/ whose binding credential is
//!   signed by SIGNATOR (self-signed when omitted or equal to NAME; a
//!   self-signed certificate is what goes in a server's trusted root set).
//!
//! `keygen cred --agent NAME --formula F [--name FILE] [--store DIR]`
//!   Sign the formula F with NAME's private key and write the credential
//!   to credentials/FILE.cred (FILE defaults to the agent name).

#![forbid(unsafe_code)]

use std::env;

use anyhow::{bail, Context};
use authproof::crypto::{generate_signing_key, Certificate, Credential};
use authproof::logic::Agent;
use authproof::parse::parse_formula;
use authproof::store::EvidenceStore;
use authproof::DirStore;

fn parse_flag(args: &[String], key: &str) -> Option<String> {
    let mut it = args.iter();
    while let Some(a) = it.next() {
        if a == key {
            return it.next().cloned();
        }
    }
    None
}

fn agent_arg(name: &str) -> Agent {
    if name.starts_with('#') {
        Agent(name.to_string())
    } else {
        Agent(format!("#{name}"))
    }
}

fn usage() -> ! {
    eprintln!("usage: keygen user --agent NAME [--signator NAME] [--store DIR]");
    eprintln!("       keygen cred --agent NAME --formula F [--name FILE] [--store DIR]");
    std::process::exit(2);
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(env::var("RUST_LOG").unwrap_or_else(|_| "keygen=info".into()))
        .with_target(false)
        .compact()
        .init();

    let args: Vec<String> = env::args().skip(1).collect();
    let Some(mode) = args.first() else { usage() };
    let store_dir = parse_flag(&args, "--store")
        .or_else(|| env::var("AUTHPROOF_STORE").ok())
        .unwrap_or_else(|| ".".into());
    let store = DirStore::new(&store_dir);
    let Some(agent_name) = parse_flag(&args, "--agent") else {
        usage()
    };
    let agent = agent_arg(&agent_name);

    match mode.as_str() {
        "user" => {
            let signator = parse_flag(&args, "--signator")
                .map(|s| agent_arg(&s))
                .unwrap_or_else(|| agent.clone());
            let key = generate_signing_key();
            store
                .save_signing_key(&agent, &key)
                .context("write private key")?;
            let signing_key = if signator == agent {
                key.clone()
            } else {
                store
                    .signing_key(&signator)
                    .context("load signator's private key")?
            };
            let cert = Certificate::make_for_key(
                key.verifying_key(),
                agent.clone(),
                signator,
                &signing_key,
            );
            store.save_certificate(&cert).context("write certificate")?;
            println!("created user {}", agent.0);
            println!("{cert}");
        }
        "cred" => {
            let Some(formula_src) = parse_flag(&args, "--formula") else {
                usage()
            };
            let formula = parse_formula(&formula_src)
                .with_context(|| format!("parse formula `{formula_src}`"))?;
            let key = store
                .signing_key(&agent)
                .context("load agent's private key")?;
            let cred = Credential::sign(formula, agent.clone(), &key);
            let file = parse_flag(&args, "--name")
                .unwrap_or_else(|| agent.0.trim_start_matches('#').to_string());
            store
                .save_credential(&file, &cred)
                .context("write credential")?;
            println!("created credential credentials/{file}.cred");
            println!("{cred}");
        }
        other => bail!("unknown mode `{other}` (expected `user` or `cred`)"),
    }
    Ok(())
}
