#![warn(
    missing_debug_implementations,
    rust_2018_idioms,
    missing_docs,
    rustdoc::broken_intra_doc_links,
    rustdoc::missing_crate_level_docs
)]

//! Command-line email sender

use std::{path::PathBuf, sync::Arc};

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use lettre::message::Mailbox;
use postbox::{
    domain::mail::{ErrorStream, Message, Provider, ProviderConfig, TemplateStore, Transport},
    infrastructure::email::{ConsoleTransport, SendgridConfig, SendgridTransport},
};
use serde_json::Value;
use tracing::{error, info};

/// Command-line arguments / environment variables
#[derive(Debug, Parser)]
pub struct Args {
    /// The provider configuration
    #[clap(flatten)]
    pub provider: ProviderConfig,

    /// Primary recipients
    #[clap(long, required = true)]
    pub to: Vec<Mailbox>,

    /// Carbon copy recipients
    #[clap(long)]
    pub cc: Vec<Mailbox>,

    /// Blind carbon copy recipients
    #[clap(long)]
    pub bcc: Vec<Mailbox>,

    /// The subject of the email
    #[clap(long)]
    pub subject: String,

    /// Plain text body; takes precedence over `--template`
    #[clap(long, default_value = "")]
    pub body: String,

    /// Template name, without extension
    #[clap(long, default_value = "")]
    pub template: String,

    /// Template data, as JSON
    #[clap(long, default_value = "null")]
    pub data: Value,

    /// Directory holding the `.txt` and `.html` templates
    #[clap(long, env = "MAIL_TEMPLATES")]
    pub templates: Option<PathBuf>,

    /// Base template file every template in the directory can extend
    #[clap(long, env = "MAIL_BASE_TEMPLATE")]
    pub base_template: Option<String>,

    /// Files to attach
    #[clap(long)]
    pub attach: Vec<PathBuf>,

    /// The transport to send through
    #[clap(subcommand)]
    pub transport: TransportCommand,
}

/// Available transports
#[derive(Debug, Subcommand)]
pub enum TransportCommand {
    /// Log the composed email instead of sending it
    Console {
        /// Compose without logging
        #[clap(long)]
        quiet: bool,
    },

    /// Send through the SendGrid API
    Sendgrid(SendgridConfig),
}

impl Args {
    fn templates(&self) -> Result<TemplateStore> {
        let Some(dir) = &self.templates else {
            return Ok(TemplateStore::new());
        };

        Ok(TemplateStore::from_dir(dir, self.base_template.as_deref())?)
    }

    fn message(&self) -> Result<Message> {
        let mut message = Message::new(&self.subject)
            .body(&self.body)
            .template(&self.template, self.data.clone());

        message.to.extend(self.to.iter().cloned());
        message.cc.extend(self.cc.iter().cloned());
        message.bcc.extend(self.bcc.iter().cloned());

        for path in &self.attach {
            message.attach_file(path, None)?;
        }

        Ok(message)
    }
}

async fn deliver<T: Transport>(
    transport: T,
    templates: TemplateStore,
    config: ProviderConfig,
    message: Message,
) -> Result<()> {
    let (provider, errors) = Provider::new(transport, Arc::new(templates), config);

    provider.send_message([message]).await?;
    provider.close().await;

    report(errors).await
}

async fn report(mut errors: ErrorStream) -> Result<()> {
    let mut failed = 0;
    while let Some(err) = errors.recv().await {
        error!("{:?}", anyhow::Error::from(err));
        failed += 1;
    }

    if failed > 0 {
        bail!("{failed} email(s) could not be delivered");
    }

    info!("email delivered");

    Ok(())
}

#[mutants::skip]
#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt::init();

    let args = Args::parse();

    let templates = args.templates()?;
    let message = args.message()?;
    let config = args.provider.clone();

    match args.transport {
        TransportCommand::Console { quiet } => {
            deliver(ConsoleTransport::new(quiet), templates, config, message).await
        }
        TransportCommand::Sendgrid(sendgrid) => {
            deliver(SendgridTransport::new(sendgrid)?, templates, config, message).await
        }
    }
}
