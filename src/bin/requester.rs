//! CLI requester
//!
//! Constructs an authorization request, with proof, for a goal of the form
//! `#root says open(<agent>, <resource>)`, loading evidence from the
//! conventional store layout (certs/, credentials/, private_keys/).
//! With `--send` the request is POSTed to the authorization server as an
//! `application/x-www-form-urlencoded` body with a single `request` field,
//! and the returned credential (or error) is printed.
//!
//! Usage:
//!   requester <agent> <resource> [--send] [--server URL] [--store DIR]
//!             [--ca AGENT] [--grantor AGENT]

#![forbid(unsafe_code)]

use std::env;

use anyhow::Context;
use authproof::logic::{Agent, Resource};
use authproof::{api, wire, DirStore};

fn parse_flag(args: &[String], key: &str) -> Option<String> {
    let mut it = args.iter();
    while let Some(a) = it.next() {
        if a == key {
            return it.next().cloned();
        }
    }
    None
}

fn has_flag(args: &[String], key: &str) -> bool {
    args.iter().any(|a| a == key)
}

/// Positional arguments: everything that is not a flag or a flag value.
fn positionals(args: &[String]) -> Vec<String> {
    const VALUE_FLAGS: [&str; 4] = ["--server", "--store", "--ca", "--grantor"];
    let mut out = Vec::new();
    let mut i = 0;
    while i < args.len() {
        let a = &args[i];
        if VALUE_FLAGS.contains(&a.as_str()) {
            i += 2;
        } else if a.starts_with("--") {
            i += 1;
        } else {
            out.push(a.clone());
            i += 1;
        }
    }
    out
}

fn agent_arg(name: &str) -> Agent {
    if name.starts_with('#') {
        Agent(name.to_string())
    } else {
        Agent(format!("#{name}"))
    }
}

fn resource_arg(name: &str) -> Resource {
    if name.starts_with('<') {
        Resource(name.to_string())
    } else {
        Resource(format!("<{name}>"))
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            env::var("RUST_LOG").unwrap_or_else(|_| "requester=info".into()),
        )
        .with_target(false)
        .compact()
        .init();

    let args: Vec<String> = env::args().skip(1).collect();
    let pos = positionals(&args);
    if pos.len() != 2 {
        eprintln!("usage: requester <agent> <resource> [--send] [--server URL] [--store DIR] [--ca AGENT] [--grantor AGENT]");
        std::process::exit(2);
    }

    let requester = agent_arg(&pos[0]);
    let resource = resource_arg(&pos[1]);
    let ca = agent_arg(&parse_flag(&args, "--ca").unwrap_or_else(|| "#ca".into()));
    let grantor = agent_arg(&parse_flag(&args, "--grantor").unwrap_or_else(|| "#root".into()));
    let store_dir = parse_flag(&args, "--store")
        .or_else(|| env::var("AUTHPROOF_STORE").ok())
        .unwrap_or_else(|| ".".into());
    let server = parse_flag(&args, "--server")
        .or_else(|| env::var("AUTHPROOF_SERVER").ok())
        .unwrap_or_else(|| "http://localhost:15316".into());

    let store = DirStore::new(&store_dir);
    let req = api::request_access(&store, &ca, &grantor, &requester, &resource)
        .context("could not construct the authorization request")?;

    println!("generated request:");
    println!("{req}");

    if !has_flag(&args, "--send") {
        println!();
        println!("use the `--send` flag to submit this to the server");
        return Ok(());
    }

    let body = wire::request_to_json(&req).context("serialize request")?;
    let url = format!("{}/accessrequest", server.trim_end_matches('/'));
    println!();
    println!("sending to {url}");
    let client = reqwest::Client::new();
    let response = client
        .post(&url)
        .form(&[("request", body)])
        .send()
        .await
        .with_context(|| format!("POST {url}"))?;
    let status = response.status();
    let text = response.text().await.context("read server response")?;

    println!();
    match wire::credential_from_json(&text) {
        Ok(cred) => {
            println!("server granted a credential:");
            println!("{cred}");
        }
        Err(_) => {
            println!("server response ({status}):");
            println!("{text}");
        }
    }
    Ok(())
}
