#![allow(missing_docs, clippy::print_stdout, clippy::print_stderr)]
//! Makes a call to an activity feed, authenticated with OAuth2.
//!
//! 1. `activities --id ID --secret SECRET` prints the URL to visit for a code.
//! 2. `... --code CODE` exchanges the code and prints the access token.
//! 3. `... --token TOKEN` fetches the feed and copies it to stdout.

use std::io::Write;

use anyhow::{Context, Result};
use bytes::Bytes;
use http::Request;
use tracing::{info, warn};

use oauth_transport::{AuthTransport, Credentials, OAuthConfig};

const AUTH_URL: &str = "https://accounts.google.com/o/oauth2/auth";
const TOKEN_URL: &str = "https://accounts.google.com/o/oauth2/token";
const SCOPE: &str = "https://www.googleapis.com/auth/buzz";
const ACTIVITIES: &str =
    "https://www.googleapis.com/buzz/v1/activities/@me/@public?max-results=1&alt=json";

const USAGE: &str = "\
Usage: activities --id CLIENT_ID --secret CLIENT_SECRET [--code CODE | --token TOKEN] [--url URL]

You must specify at least --id and --secret (or set OAUTH_CLIENT_ID and OAUTH_CLIENT_SECRET).
To obtain these details, register an OAuth 2 client in the provider's API console.
";

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt().with_writer(std::io::stderr).init();

    let args = AppArgs::parse().context("parsing arguments")?;
    let (Some(client_id), Some(client_secret)) = (args.client_id, args.client_secret) else {
        eprint!("{USAGE}");
        return Ok(());
    };

    let config = OAuthConfig::builder(client_id, client_secret, AUTH_URL, TOKEN_URL)
        .context("building OAuth2 config")?
        .with_scope(SCOPE)
        .build()
        .context("building OAuth2 config")?;
    let transport = AuthTransport::new(config);

    // Step one, get an authorization code from the provider.
    let Some(token) = args.token else {
        let Some(code) = args.code else {
            println!("Visit this URL to get a code, then run again with --code YOUR_CODE");
            println!("{}", transport.authorize_url());
            return Ok(());
        };

        // Step two, exchange the authorization code for an access token.
        let credentials = transport
            .exchange(&code)
            .await
            .context("exchanging authorization code")?;
        println!("Now run again with --token {}", credentials.access_token());
        if let Some(refresh_token) = credentials.refresh_token() {
            println!("Keep the refresh token as well to renew it later: {refresh_token}");
        }
        return Ok(());
    };

    // Step three, make the actual request using the token to authenticate.
    transport.set_credentials(Credentials::new(token)).await;
    let request = Request::get(args.url.as_str())
        .body(Bytes::new())
        .context("building request")?;
    let response = transport
        .send(request)
        .await
        .with_context(|| format!("fetching {}", args.url))?;
    info!(status = %response.status(), "received response");

    let mut stdout = std::io::stdout().lock();
    stdout
        .write_all(response.body())
        .context("writing response body")?;
    writeln!(stdout).context("writing response body")?;
    Ok(())
}

#[derive(Debug)]
struct AppArgs {
    client_id: Option<String>,
    client_secret: Option<String>,
    code: Option<String>,
    token: Option<String>,
    url: String,
}

impl AppArgs {
    fn parse() -> Result<Self> {
        let mut pargs = pico_args::Arguments::from_env();

        let client_id = pargs
            .opt_value_from_str("--id")
            .context("parsing id argument")?;
        let client_secret = pargs
            .opt_value_from_str("--secret")
            .context("parsing secret argument")?;
        let code = pargs
            .opt_value_from_str("--code")
            .context("parsing code argument")?;
        let token = pargs
            .opt_value_from_str("--token")
            .context("parsing token argument")?;
        let url = pargs
            .opt_value_from_str("--url")
            .context("parsing url argument")?;

        let result = Self {
            client_id: client_id.or_else(|| std::env::var("OAUTH_CLIENT_ID").ok()),
            client_secret: client_secret.or_else(|| std::env::var("OAUTH_CLIENT_SECRET").ok()),
            code,
            token,
            url: url.unwrap_or_else(|| ACTIVITIES.to_string()),
        };

        let remaining = pargs.finish();
        if !remaining.is_empty() {
            warn!(?remaining, "Warning: unused arguments left");
        }
        Ok(result)
    }
}
