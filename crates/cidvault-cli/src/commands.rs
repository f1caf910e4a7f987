use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::Context;
use cidvault_pipeline::{
    Pipeline, PipelineError, PublishStage, RetrievedFile, SelectedFile, VaultConfig,
};
use cidvault_types::{Account, Cid, Document};
use colored::Colorize;
use serde_json::json;

use crate::cli::*;

const LOCAL_CONFIG: &str = "cidvault.toml";

pub async fn run_command(cli: Cli) -> anyhow::Result<()> {
    let config = load_config(cli.config.as_deref())?;
    let format = cli.format;
    // Printing the configuration must work even when it is incomplete.
    if matches!(cli.command, Command::Config) {
        return cmd_config(&config, format);
    }
    let pipeline = Pipeline::from_config(&config).map_err(explain)?;
    match cli.command {
        Command::Whoami => cmd_whoami(&pipeline, format).await,
        Command::Publish(args) => cmd_publish(&pipeline, args, format).await,
        Command::List(args) => cmd_list(&pipeline, args, format).await,
        Command::Fetch(args) => cmd_fetch(&pipeline, args).await,
        Command::Download(args) => cmd_download(&pipeline, args, format).await,
        Command::Watch(args) => cmd_watch(&pipeline, args, format).await,
        Command::Config => cmd_config(&config, format),
    }
}

fn load_config(path: Option<&Path>) -> anyhow::Result<VaultConfig> {
    let config = match path {
        Some(path) => VaultConfig::load(path)?,
        None if Path::new(LOCAL_CONFIG).exists() => VaultConfig::load(Path::new(LOCAL_CONFIG))?,
        None => VaultConfig::from_env()?,
    };
    tracing::debug!(?config, "configuration loaded");
    Ok(config)
}

/// Attach the failure category and remediation hint to a pipeline error.
fn explain(err: PipelineError) -> anyhow::Error {
    anyhow::anyhow!(
        "{err}\n  {} {}. {}",
        "cause:".dimmed(),
        err.category(),
        err.remediation()
    )
}

async fn resolve_account(pipeline: &Pipeline, explicit: Option<&str>) -> anyhow::Result<Account> {
    match explicit {
        Some(text) => text
            .parse::<Account>()
            .with_context(|| format!("invalid account {text:?}")),
        None => Ok(pipeline.connect().await.map_err(explain)?.account),
    }
}

fn parse_cid(text: &str) -> anyhow::Result<Cid> {
    Cid::new(text).with_context(|| format!("invalid CID {text:?}"))
}

async fn cmd_whoami(pipeline: &Pipeline, format: OutputFormat) -> anyhow::Result<()> {
    let conn = pipeline.connect().await.map_err(explain)?;
    if format == OutputFormat::Json {
        println!("{}", serde_json::to_string_pretty(&conn)?);
        return Ok(());
    }
    println!("Account: {}", conn.account.to_string().cyan().bold());
    if conn.on_expected_network() {
        println!("Network: {} {}", conn.network, "✓".green());
    } else {
        println!(
            "Network: {} {} (expected {})",
            conn.network.to_string().red(),
            "✗".red().bold(),
            conn.expected_network
        );
    }
    if conn.accounts.len() > 1 {
        println!("  {} other account(s) connected", conn.accounts.len() - 1);
    }
    Ok(())
}

async fn cmd_publish(
    pipeline: &Pipeline,
    args: PublishArgs,
    format: OutputFormat,
) -> anyhow::Result<()> {
    let bytes = std::fs::read(&args.path)
        .with_context(|| format!("cannot read {}", args.path.display()))?;
    let name = args.name.or_else(|| {
        args.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
    });
    let account = pipeline.connect().await.map_err(explain)?.account;

    let file = SelectedFile {
        name,
        bytes: bytes.into(),
    };
    let session = pipeline.publish(&account, file).await;

    if format == OutputFormat::Text {
        for step in session.transitions() {
            if step.to != PublishStage::Done.name() && !step.to.starts_with("fail") {
                println!("  {} {}", "·".dimmed(), step.to.replace('_', " "));
            }
        }
        if session.is_orphaned() {
            if let Some(cid) = session.cid() {
                println!(
                    "  {} {} was pinned but not registered",
                    "!".yellow().bold(),
                    cid.to_string().yellow()
                );
            }
        }
    }

    let receipt = session.into_result().map_err(explain)?;
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&receipt)?),
        OutputFormat::Text => {
            println!("{} Published", "✓".green().bold());
            println!("  CID: {}", receipt.cid.to_string().cyan());
            println!("  Tx: {}", receipt.tx_hash.to_string().yellow());
            println!(
                "  Block: {} at {}",
                receipt.block_number,
                receipt.registered_at.format("%Y-%m-%d %H:%M:%S UTC")
            );
        }
    }
    Ok(())
}

fn print_documents(
    account: &Account,
    documents: &[Document],
    format: OutputFormat,
) -> anyhow::Result<()> {
    if format == OutputFormat::Json {
        println!(
            "{}",
            serde_json::to_string_pretty(&json!({ "account": account, "documents": documents }))?
        );
        return Ok(());
    }
    if documents.is_empty() {
        println!("No documents registered by {}.", account.to_string().cyan());
        return Ok(());
    }
    println!("Documents for {}:", account.to_string().cyan());
    for doc in documents {
        println!(
            "  {}  {}  {}",
            doc.registered_at.format("%Y-%m-%d %H:%M").to_string().dimmed(),
            doc.display_name.bold(),
            doc.cid.to_string().yellow()
        );
    }
    Ok(())
}

async fn cmd_list(pipeline: &Pipeline, args: ListArgs, format: OutputFormat) -> anyhow::Result<()> {
    let account = resolve_account(pipeline, args.account.as_deref()).await?;
    let documents = pipeline.list(&account).await.map_err(explain)?;
    print_documents(&account, &documents, format)
}

async fn cmd_fetch(pipeline: &Pipeline, args: FetchArgs) -> anyhow::Result<()> {
    let cid = parse_cid(&args.cid)?;
    let bytes = pipeline.download_raw(&cid).await.map_err(explain)?;
    match args.output {
        Some(path) => {
            std::fs::write(&path, &bytes)
                .with_context(|| format!("cannot write {}", path.display()))?;
            eprintln!("{} Saved envelope to {}", "✓".green(), path.display());
        }
        None => {
            let mut stdout = std::io::stdout().lock();
            stdout.write_all(&bytes)?;
            stdout.flush()?;
        }
    }
    Ok(())
}

async fn cmd_download(
    pipeline: &Pipeline,
    args: DownloadArgs,
    format: OutputFormat,
) -> anyhow::Result<()> {
    let cid = parse_cid(&args.cid)?;
    let account = pipeline.connect().await.map_err(explain)?.account;

    let file = pipeline.retrieve_named(&account, &cid).await.map_err(explain)?;

    let path = args.output.unwrap_or_else(|| default_output_path(&file));
    std::fs::write(&path, &file.bytes)
        .with_context(|| format!("cannot write {}", path.display()))?;

    match format {
        OutputFormat::Json => println!(
            "{}",
            serde_json::to_string_pretty(&json!({
                "cid": file.cid,
                "path": path.display().to_string(),
                "bytes": file.bytes.len(),
            }))?
        ),
        OutputFormat::Text => println!(
            "{} Decrypted {} ({} bytes) to {}",
            "✓".green().bold(),
            file.name.bold(),
            file.bytes.len(),
            path.display()
        ),
    }
    Ok(())
}

async fn cmd_watch(
    pipeline: &Pipeline,
    args: ListArgs,
    format: OutputFormat,
) -> anyhow::Result<()> {
    let account = resolve_account(pipeline, args.account.as_deref()).await?;
    let mut watch = pipeline.watch_documents(account);
    loop {
        tokio::select! {
            listing = watch.next() => match listing {
                Some(Ok(listing)) => print_documents(&listing.account, &listing.documents, format)?,
                Some(Err(err)) => eprintln!("{} {}", "✗".red(), explain(err)),
                None => return Ok(()),
            },
            _ = tokio::signal::ctrl_c() => return Ok(()),
        }
    }
}

fn cmd_config(config: &VaultConfig, format: OutputFormat) -> anyhow::Result<()> {
    let secret = |v: &Option<String>| if v.is_some() { "set" } else { "not set" };
    let validity = config.validate();
    if format == OutputFormat::Json {
        let value = json!({
            "registry_address": config.registry_address,
            "chain_id": config.chain_id.map(|c| c.0),
            "rpc_url": config.rpc_url,
            "pin_endpoint": config.pin_endpoint,
            "pin_jwt": secret(&config.pin_jwt),
            "gateways": config.gateways,
            "metadata_jwt": secret(&config.metadata_jwt),
            "metadata_endpoint": config.metadata_endpoint,
            "confirmations": config.confirmations,
            "poll_interval_ms": config.poll_interval_ms,
            "from_block": config.from_block,
            "valid": validity.is_ok(),
        });
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(());
    }

    let show = |v: Option<String>| v.unwrap_or_else(|| "(not set)".dimmed().to_string());
    println!(
        "{} = {}",
        "registry_address".bold(),
        show(config.registry_address.map(|a| a.to_string()))
    );
    println!("{} = {}", "chain_id".bold(), show(config.chain_id.map(|c| c.to_string())));
    println!("{} = {}", "rpc_url".bold(), show(config.rpc_url.clone()));
    println!("{} = {}", "pin_endpoint".bold(), config.pin_endpoint);
    println!("{} = {}", "pin_jwt".bold(), secret(&config.pin_jwt));
    for (i, gateway) in config.gateways.iter().enumerate() {
        println!("{} = {}", format!("gateways[{i}]").bold(), gateway);
    }
    println!("{} = {}", "metadata_jwt".bold(), secret(&config.metadata_jwt));
    println!("{} = {}", "metadata_endpoint".bold(), config.metadata_endpoint);
    println!("{} = {}", "confirmations".bold(), config.confirmations);
    println!("{} = {}", "poll_interval_ms".bold(), config.poll_interval_ms);
    println!("{} = {}", "from_block".bold(), config.from_block);
    match validity {
        Ok(()) => println!("{} Configuration complete", "✓".green().bold()),
        Err(e) => println!("{} {}", "✗".red().bold(), e),
    }
    Ok(())
}

/// File name for a decrypted document when no output path was given.
fn default_output_path(file: &RetrievedFile) -> PathBuf {
    let from_name = Path::new(&file.name)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .filter(|n| !n.is_empty() && *n != file.cid.short());
    PathBuf::from(from_name.unwrap_or_else(|| file.cid.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file(name: &str, cid: &str) -> RetrievedFile {
        RetrievedFile {
            cid: Cid::new(cid).unwrap(),
            name: name.into(),
            bytes: Default::default(),
        }
    }

    #[test]
    fn output_path_uses_display_name() {
        assert_eq!(
            default_output_path(&file("contract.pdf", "bafy123")),
            PathBuf::from("contract.pdf")
        );
    }

    #[test]
    fn output_path_strips_directories() {
        assert_eq!(
            default_output_path(&file("../../etc/passwd", "bafy123")),
            PathBuf::from("passwd")
        );
    }

    #[test]
    fn output_path_replaces_truncated_cid() {
        let long = "bafybeigdyrzt5sfp7udm7hu76uh7y26nf3efuylqabf3oclgtqy55fbzdi";
        assert_eq!(
            default_output_path(&file("bafybe…bzdi", long)),
            PathBuf::from(long)
        );
    }

    #[test]
    fn config_from_file_argument() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vault.toml");
        std::fs::write(&path, "chain_id = 1\npin_jwt = \"x\"\n").unwrap();
        let config = load_config(Some(&path)).unwrap();
        assert_eq!(config.chain_id.map(|c| c.0), Some(1));
    }

    #[test]
    fn explained_errors_carry_remediation() {
        let text = explain(PipelineError::DecryptionDenied).to_string();
        assert!(text.contains("Approve the decryption request"));
    }
}
