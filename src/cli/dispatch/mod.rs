use crate::cli::{actions::Action, globals::GlobalArgs};
use anyhow::Result;
use secrecy::SecretString;

pub fn handler(matches: &clap::ArgMatches) -> Result<(Action, GlobalArgs)> {
    let action = Action::Server {
        port: matches.get_one::<u16>("port").copied().unwrap_or(8080),
        dsn: matches
            .get_one("dsn")
            .map(|s: &String| s.to_string())
            .ok_or_else(|| anyhow::anyhow!("missing required argument: --dsn"))?,
        cors_origin: matches
            .get_one("cors-origin")
            .map(|s: &String| s.to_string()),
    };

    let mut globals = GlobalArgs::new(
        matches
            .get_one::<i64>("session-ttl")
            .copied()
            .unwrap_or(86400),
    );

    if let Some(email) = matches.get_one::<String>("admin-email") {
        let password = matches
            .get_one::<String>("admin-password")
            .map(|s| SecretString::from(s.to_string()))
            .unwrap_or_default();
        globals.set_admin(email.to_string(), password);
    }

    Ok((action, globals))
}
