//! Main application entry point (CLI binary).
//!
//! This is a thin wrapper around the `egress` library that handles:
//! - Command-line argument parsing
//! - Logger and crypto provider initialization
//! - Building one message and sending it through a manual-request
//!   dispatcher
//! - Printing the response the way the proxy suite records it
//!
//! All core functionality is implemented in the library crate.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::process;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use reqwest::header::{HeaderName, HeaderValue};
use reqwest::Method;
use url::Url;

use egress::initialization::{init_crypto_provider, init_logger_with};
use egress::{
    ConnectionConfig, EngineContext, HttpMessage, Initiator, LogFormat, LogLevel, ProxyConfig,
    ProxyCredentials, RequestData, RequestDispatcher,
};

/// Command-line options.
///
/// This struct is automatically generated by `clap` from the field attributes.
///
/// # Examples
///
/// ```bash
/// # Basic usage
/// egress http://example.com/
///
/// # POST with a body, following redirects
/// egress http://example.com/submit --method POST --data 'a=1' --follow-redirects
///
/// # Download through an authenticated proxy
/// egress https://example.com/big.bin --output big.bin \
///     --proxy proxy.local:8080 --proxy-user scanner:secret
/// ```
#[derive(Debug, Parser)]
#[command(
    name = "egress",
    about = "Sends one HTTP/HTTPS request through the proxy suite's request engine."
)]
struct Opt {
    /// URL to request
    url: Url,

    /// HTTP method
    #[arg(long, default_value = "GET")]
    method: String,

    /// Request header as "Name: value" (repeatable)
    #[arg(long = "header", value_name = "NAME: VALUE")]
    headers: Vec<String>,

    /// Request body
    #[arg(long)]
    data: Option<String>,

    /// Follow redirect responses
    #[arg(long)]
    follow_redirects: bool,

    /// Maximum redirect hops to follow
    #[arg(long, default_value_t = 100)]
    max_redirects: u32,

    /// Per-request timeout in seconds
    #[arg(long, default_value_t = 20)]
    timeout_seconds: u64,

    /// Write the response body to this file instead of stdout
    #[arg(long, value_name = "FILE")]
    output: Option<PathBuf>,

    /// Upstream proxy as host:port
    #[arg(long, value_name = "HOST:PORT")]
    proxy: Option<String>,

    /// Proxy credentials as user:password
    #[arg(long, value_name = "USER:PASS")]
    proxy_user: Option<String>,

    /// Log level: error|warn|info|debug|trace
    #[arg(long, value_enum, default_value_t = LogLevel::Info)]
    log_level: LogLevel,

    /// Log format: plain|json
    #[arg(long, value_enum, default_value_t = LogFormat::Plain)]
    log_format: LogFormat,
}

fn main() -> Result<()> {
    let opt = Opt::parse();

    init_logger_with(opt.log_level.clone().into(), opt.log_format.clone())
        .context("Failed to initialize logger")?;
    init_crypto_provider();

    if let Err(e) = run(opt) {
        eprintln!("egress error: {:#}", e);
        process::exit(1);
    }
    Ok(())
}

fn run(opt: Opt) -> Result<()> {
    let config = ConnectionConfig {
        default_timeout: Duration::from_secs(opt.timeout_seconds),
        proxy: parse_proxy(&opt)?,
        ..ConnectionConfig::default()
    };
    let context = EngineContext::new(config);
    let dispatcher = RequestDispatcher::new(context, Initiator::MANUAL_REQUEST);
    dispatcher.set_follow_redirects(opt.follow_redirects);
    dispatcher.set_max_redirects(opt.max_redirects);

    let mut message = build_message(&opt)?;
    let target = message.request.url.clone();

    match &opt.output {
        Some(path) => dispatcher.send_to_file(&mut message, path),
        None => dispatcher.send(&mut message),
    }
    .with_context(|| format!("Request to {} failed", target))?;

    print_response(&message, opt.output.as_deref())?;
    Ok(())
}

fn build_message(opt: &Opt) -> Result<HttpMessage> {
    let method: Method = opt
        .method
        .parse()
        .with_context(|| format!("Invalid method {:?}", opt.method))?;

    let mut message = HttpMessage::new(RequestData::new(method, opt.url.clone()));
    for header in &opt.headers {
        let (name, value) = header
            .split_once(':')
            .with_context(|| format!("Invalid header {:?}, expected \"Name: value\"", header))?;
        let name = HeaderName::from_bytes(name.trim().as_bytes())
            .with_context(|| format!("Invalid header name in {:?}", header))?;
        let value = HeaderValue::from_str(value.trim())
            .with_context(|| format!("Invalid header value in {:?}", header))?;
        message.request.headers.append(name, value);
    }
    if let Some(data) = &opt.data {
        message.request.body = data.clone().into_bytes();
    }
    Ok(message)
}

fn parse_proxy(opt: &Opt) -> Result<Option<ProxyConfig>> {
    let Some(proxy) = &opt.proxy else {
        return Ok(None);
    };
    let (host, port) = proxy
        .rsplit_once(':')
        .with_context(|| format!("Invalid proxy {:?}, expected host:port", proxy))?;
    let port: u16 = port
        .parse()
        .with_context(|| format!("Invalid proxy port in {:?}", proxy))?;

    let credentials = match &opt.proxy_user {
        Some(user) => {
            let (username, password) = user
                .split_once(':')
                .context("Invalid proxy credentials, expected user:password")?;
            Some(ProxyCredentials {
                username: username.to_string(),
                password: password.to_string(),
            })
        }
        None => None,
    };

    Ok(Some(ProxyConfig {
        host: host.to_string(),
        port,
        credentials,
        exclude_hosts: Vec::new(),
    }))
}

fn print_response(message: &HttpMessage, output: Option<&Path>) -> Result<()> {
    let Some(response) = &message.response else {
        return Ok(());
    };

    println!("{:?} {}", response.version, response.status);
    for (name, value) in &response.headers {
        println!("{}: {}", name, String::from_utf8_lossy(value.as_bytes()));
    }
    println!();

    match output {
        Some(path) => println!("Body written to {}", path.display()),
        None => {
            let mut stdout = std::io::stdout().lock();
            stdout
                .write_all(&response.body)
                .context("Failed to write response body")?;
        }
    }
    Ok(())
}
