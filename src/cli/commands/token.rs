use chrono::{DateTime, TimeZone, Utc};
use clap::Subcommand;
use serde_json::json;

use crate::auth::{lifetime_from_hours, JwtAuthenticator, JwtError};
use crate::cli::utils::{output_error, output_success};
use crate::cli::OutputFormat;
use crate::config::AppConfig;

#[derive(Subcommand)]
pub enum TokenCommands {
    #[command(about = "Sign a bearer token for a user id (reads JWT_SECRET)")]
    Issue {
        #[arg(help = "Numeric user id to embed as the token subject")]
        subject: i64,
        #[arg(long, help = "Lifetime in hours (defaults to SECURITY_JWT_EXPIRY_HOURS)")]
        hours: Option<u64>,
    },

    #[command(about = "Validate a token against JWT_SECRET and show its claims")]
    Inspect {
        #[arg(help = "Bearer token")]
        token: String,
    },
}

pub async fn handle(cmd: TokenCommands, output_format: OutputFormat) -> anyhow::Result<()> {
    let security = AppConfig::security_from_env()?;
    let auth = JwtAuthenticator::new(&security)?;

    match cmd {
        TokenCommands::Issue { subject, hours } => {
            let hours = hours.unwrap_or(security.jwt_expiry_hours);
            let expires_at = expiry_after(hours)?;
            let token = auth.issue_with_expiry(subject, expires_at)?;

            output_success(
                output_format,
                &format!("Issued token for user {}", subject),
                Some(json!({
                    "token": token,
                    "subject": subject,
                    "expires_at": expires_at.to_rfc3339(),
                })),
            )
        }
        TokenCommands::Inspect { token } => match auth.validate(&token) {
            Ok(claims) => {
                let expires_at = Utc
                    .timestamp_opt(claims.exp, 0)
                    .single()
                    .map(|dt| dt.to_rfc3339());
                output_success(
                    output_format,
                    "Token is valid",
                    Some(json!({
                        "subject": claims.sub,
                        "exp": claims.exp,
                        "expires_at": expires_at,
                    })),
                )
            }
            Err(e) => {
                output_error(output_format, &e.to_string(), Some("INVALID_TOKEN"))?;
                anyhow::bail!("token rejected")
            }
        },
    }
}

fn expiry_after(hours: u64) -> Result<DateTime<Utc>, JwtError> {
    let lifetime = lifetime_from_hours(hours)?;
    Utc::now()
        .checked_add_signed(lifetime)
        .ok_or(JwtError::InvalidLifetime(hours))
}
