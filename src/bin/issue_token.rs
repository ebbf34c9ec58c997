//! Prints a bearer token for local testing.
//!
//! Usage: issue-token <user-uuid> <email> [--admin]

use std::env;

use anyhow::{bail, Context};
use lostnfound_api::config::JwtConfig;
use lostnfound_api::middleware::{issue_token, CallerIdentity};
use uuid::Uuid;

fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let args: Vec<String> = env::args().skip(1).collect();
    let (user_id, email) = match args.as_slice() {
        [id, email, ..] => (id, email),
        _ => bail!("usage: issue-token <user-uuid> <email> [--admin]"),
    };
    let is_admin = args.iter().skip(2).any(|a| a == "--admin");

    let user_id = Uuid::parse_str(user_id).with_context(|| format!("invalid user id: {}", user_id))?;
    let jwt = JwtConfig::from_env().context("JWT_SECRET must be set")?;

    let identity = CallerIdentity {
        user_id,
        email: email.clone(),
        is_admin,
    };
    let token = issue_token(&jwt.secret, &identity, jwt.ttl())
        .context("failed to sign token")?;
    println!("{}", token);
    Ok(())
}
