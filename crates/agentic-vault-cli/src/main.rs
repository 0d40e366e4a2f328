//! AgenticVault CLI: `avault` command.
//!
//! Provides a command-line interface for inspecting facts, registering
//! schemas, managing encrypted connection bundles, and checking identity
//! and signing keys.

use std::io::{BufRead, Read, Write};
use std::path::PathBuf;

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use serde_json::{json, Map, Value};

use agentic_vault::store::{Credentials, WriteOutcome};
use agentic_vault::{
    CredentialPrompter, PromptSession, RecordedKey, StoreError, Vault, VaultConfig,
};

/// Exit status for key errors that need manual intervention.
const EXIT_FATAL: i32 = 2;

// ── Input helpers ─────────────────────────────────────────────────────────────

fn prompt_line(prompt: &str) -> std::io::Result<String> {
    eprint!("{prompt}");
    std::io::stderr().flush()?;
    let mut line = String::new();
    std::io::stdin().lock().read_line(&mut line)?;
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}

fn read_line(prompt: &str) -> Result<String> {
    prompt_line(prompt).context("failed to read from stdin")
}

/// A JSON argument, or stdin when the argument is `-`.
fn read_json_arg(arg: &str) -> Result<Value> {
    let text = if arg == "-" {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("failed to read JSON from stdin")?;
        buf
    } else {
        arg.to_string()
    };
    serde_json::from_str(&text).context("argument is not valid JSON")
}

fn read_json_object(arg: &str) -> Result<Map<String, Value>> {
    match read_json_arg(arg)? {
        Value::Object(map) => Ok(map),
        other => Err(anyhow!("expected a JSON object, got {other}")),
    }
}

fn print_json(value: &Value) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Asks on the terminal for connection fields that are not stored.
struct TerminalPrompter;

impl CredentialPrompter for TerminalPrompter {
    fn prompt(&mut self, bundle: &str, field: &str) -> agentic_vault::Result<Option<String>> {
        let answer = prompt_line(&format!("{bundle}.{field}: "))
            .map_err(|e| StoreError::io("<stdin>", e))?;
        Ok(Some(answer).filter(|a| !a.is_empty()))
    }
}

// ── CLI structure ─────────────────────────────────────────────────────────────

/// AgenticVault CLI: schema-validated facts and encrypted credentials for
/// AI agents.
#[derive(Parser, Debug)]
#[command(
    name = "avault",
    about = "AgenticVault CLI",
    version,
    long_about = "avault: AgenticVault CLI\n\nStore schema-validated facts, keep credentials encrypted per field\nunder a did:key workspace identity, and check local signing keys."
)]
struct Cli {
    /// Workspace root (default: $AGENTIC_VAULT_ROOT or ~/.agentic/vault)
    #[arg(long, global = true)]
    root: Option<PathBuf>,

    /// JSON config file; --root and --identity override it
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Active identity key (default: $AGENTIC_VAULT_IDENTITY or "default")
    #[arg(long, global = true)]
    identity: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Read and write facts
    Fact {
        #[command(subcommand)]
        subcommand: FactCommands,
    },

    /// Register schemas and validate data
    Schema {
        #[command(subcommand)]
        subcommand: SchemaCommands,
    },

    /// Manage encrypted connection bundles
    Connection {
        #[command(subcommand)]
        subcommand: ConnectionCommands,
    },

    /// Manage workspace identity keys
    Identity {
        #[command(subcommand)]
        subcommand: IdentityCommands,
    },

    /// Discover and verify local signing keys
    Keyring {
        #[command(subcommand)]
        subcommand: KeyringCommands,
    },
}

#[derive(Subcommand, Debug)]
enum FactCommands {
    /// Print a fact with its staleness and validation feedback
    Get {
        entity_type: String,
        instance: String,
        /// Raw source file the fact was derived from (repeatable)
        #[arg(long = "source")]
        sources: Vec<PathBuf>,
    },
    /// Write a fact from a JSON object (or `-` for stdin)
    Set {
        entity_type: String,
        instance: String,
        data: String,
    },
    /// Delete a fact
    Delete { entity_type: String, instance: String },
    /// List instances of an entity type
    List { entity_type: String },
}

#[derive(Subcommand, Debug)]
enum SchemaCommands {
    /// Register a JSON Schema for an entity type
    Register {
        entity_type: String,
        /// Path to the schema file
        file: PathBuf,
        #[arg(long, default_value_t = 1)]
        version: u32,
    },
    /// Validate a JSON document (or `-` for stdin) against a registered schema
    Validate { entity_type: String, data: String },
    /// List registered entity types
    List,
}

#[derive(Subcommand, Debug)]
enum ConnectionCommands {
    /// Print a bundle, or a single field (prompting if it is missing)
    Get {
        bundle: String,
        #[arg(long)]
        field: Option<String>,
    },
    /// Write a bundle from FIELD=VALUE pairs, replacing its contents
    Set {
        bundle: String,
        #[arg(required = true)]
        values: Vec<String>,
    },
    /// Delete a bundle
    Delete { bundle: String },
    /// List bundles
    List,
}

#[derive(Subcommand, Debug)]
enum IdentityCommands {
    /// Create a new identity key
    Generate { name: Option<String> },
    /// Display identity key information
    Show { name: Option<String> },
    /// Print the DID of an identity key
    Did { name: Option<String> },
    /// List identity keys
    List,
}

#[derive(Subcommand, Debug)]
enum KeyringCommands {
    /// List signing keys with their fingerprints
    List,
    /// Create a passphrase-protected signing key (passphrase read from stdin)
    Create {
        name: String,
        #[arg(long, default_value = "")]
        comment: String,
    },
    /// Check a signing key against its recorded fingerprint
    Verify {
        /// Path to the private key file
        key: PathBuf,
        #[arg(long)]
        fingerprint: String,
    },
}

// ── Main ──────────────────────────────────────────────────────────────────────

fn main() {
    env_logger::init();

    let cli = Cli::parse();
    let result = load_config(&cli)
        .and_then(|config| Vault::open(config).context("failed to open vault"))
        .and_then(|mut vault| run(&mut vault, cli.command));

    if let Err(e) = result {
        if let Some(fatal) = e
            .chain()
            .find_map(|c| c.downcast_ref::<StoreError>())
            .filter(|s| s.is_fatal())
        {
            eprintln!("fatal: {fatal}");
            eprintln!("Key material has not been modified. Restore the expected key or resolve the mismatch manually.");
            std::process::exit(EXIT_FATAL);
        }
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}

fn load_config(cli: &Cli) -> Result<VaultConfig> {
    let mut config = match &cli.config {
        Some(path) => VaultConfig::load(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => VaultConfig::from_env(),
    };
    if let Some(root) = &cli.root {
        config.root = root.clone();
    }
    if let Some(identity) = &cli.identity {
        config.identity = identity.clone();
    }
    Ok(config)
}

fn run(vault: &mut Vault, command: Commands) -> Result<()> {
    match command {
        Commands::Fact { subcommand } => match subcommand {
            FactCommands::Get {
                entity_type,
                instance,
                sources,
            } => cmd_fact_get(vault, &entity_type, &instance, &sources),
            FactCommands::Set {
                entity_type,
                instance,
                data,
            } => cmd_fact_set(vault, &entity_type, &instance, &data),
            FactCommands::Delete {
                entity_type,
                instance,
            } => {
                let removed = vault.facts().delete(&entity_type, &instance)?;
                println!("{}", if removed { "deleted" } else { "not found" });
                Ok(())
            }
            FactCommands::List { entity_type } => {
                for instance in vault.facts().list(&entity_type)? {
                    println!("{instance}");
                }
                Ok(())
            }
        },
        Commands::Schema { subcommand } => match subcommand {
            SchemaCommands::Register {
                entity_type,
                file,
                version,
            } => cmd_schema_register(vault, &entity_type, &file, version),
            SchemaCommands::Validate { entity_type, data } => {
                cmd_schema_validate(vault, &entity_type, &data)
            }
            SchemaCommands::List => {
                for entity_type in vault.schemas().registered_types() {
                    let version = vault.schemas().version(entity_type).unwrap_or_default();
                    println!("{entity_type}\tv{version}");
                }
                Ok(())
            }
        },
        Commands::Connection { subcommand } => match subcommand {
            ConnectionCommands::Get { bundle, field } => {
                cmd_connection_get(vault, &bundle, field.as_deref())
            }
            ConnectionCommands::Set { bundle, values } => {
                cmd_connection_set(vault, &bundle, &values)
            }
            ConnectionCommands::Delete { bundle } => {
                let removed = vault.connections().delete(&bundle)?;
                println!("{}", if removed { "deleted" } else { "not found" });
                Ok(())
            }
            ConnectionCommands::List => {
                for bundle in vault.connections().list()? {
                    println!("{bundle}");
                }
                Ok(())
            }
        },
        Commands::Identity { subcommand } => match subcommand {
            IdentityCommands::Generate { name } => cmd_identity_generate(vault, name),
            IdentityCommands::Show { name } => cmd_identity_show(vault, name),
            IdentityCommands::Did { name } => {
                let key = require_identity(vault, name)?;
                println!("{}", key.did());
                Ok(())
            }
            IdentityCommands::List => {
                for name in vault.identities().list()? {
                    println!("{name}");
                }
                Ok(())
            }
        },
        Commands::Keyring { subcommand } => match subcommand {
            KeyringCommands::List => cmd_keyring_list(vault),
            KeyringCommands::Create { name, comment } => {
                cmd_keyring_create(vault, &name, &comment)
            }
            KeyringCommands::Verify { key, fingerprint } => {
                let files = vault.keyring().verify(&RecordedKey {
                    private_path: key,
                    fingerprint,
                })?;
                println!("ok: {} ({})", files.name, files.private_path.display());
                Ok(())
            }
        },
    }
}

// ── Command implementations ───────────────────────────────────────────────────

/// `avault fact get TYPE INSTANCE [--source PATH]...`
fn cmd_fact_get(
    vault: &Vault,
    entity_type: &str,
    instance: &str,
    sources: &[PathBuf],
) -> Result<()> {
    let Some(fact) = vault.facts().get(entity_type, instance, sources)? else {
        return print_json(&Value::Null);
    };
    let mut out = json!({
        "data": Value::Object(fact.data),
        "stale": fact.stale,
    });
    if let Some(report) = fact.validation {
        out["validation"] = serde_json::to_value(report)?;
    }
    print_json(&out)
}

/// `avault fact set TYPE INSTANCE JSON`
fn cmd_fact_set(vault: &Vault, entity_type: &str, instance: &str, data: &str) -> Result<()> {
    let data = read_json_object(data)?;
    let facts = vault.facts();
    let outcome = facts.set(entity_type, instance, &data)?;
    println!(
        "{}",
        match outcome {
            WriteOutcome::Written => "written",
            WriteOutcome::Unchanged => "unchanged",
        }
    );
    if let Some(report) = facts
        .get(entity_type, instance, &[] as &[PathBuf])?
        .and_then(|f| f.validation)
    {
        for err in &report.errors {
            eprintln!("invalid: {} {} ({})", err.path, err.message, err.keyword);
        }
        for warning in &report.warnings {
            eprintln!("warning: {warning}");
        }
    }
    Ok(())
}

/// `avault schema register TYPE FILE [--version N]`
fn cmd_schema_register(
    vault: &mut Vault,
    entity_type: &str,
    file: &std::path::Path,
    version: u32,
) -> Result<()> {
    let text = std::fs::read_to_string(file)
        .with_context(|| format!("failed to read schema {}", file.display()))?;
    let schema: Value = serde_json::from_str(&text)
        .with_context(|| format!("schema {} is not valid JSON", file.display()))?;
    let outcome = vault.register_schema(entity_type, schema, version)?;
    println!(
        "{entity_type}.v{version} {}",
        match outcome {
            WriteOutcome::Written => "registered",
            WriteOutcome::Unchanged => "unchanged",
        }
    );
    Ok(())
}

/// `avault schema validate TYPE JSON`
fn cmd_schema_validate(vault: &Vault, entity_type: &str, data: &str) -> Result<()> {
    let data = read_json_arg(data)?;
    let report = vault.schemas().validate(entity_type, &data);
    print_json(&serde_json::to_value(&report)?)?;
    if report.is_valid() {
        Ok(())
    } else {
        Err(anyhow!(
            "{} validation error(s) for {entity_type}",
            report.errors.len()
        ))
    }
}

/// `avault connection get BUNDLE [--field FIELD]`
fn cmd_connection_get(vault: &Vault, bundle: &str, field: Option<&str>) -> Result<()> {
    let connections = vault.connections();
    match field {
        Some(field) => {
            let mut session = PromptSession::new();
            let value =
                connections.get_value(bundle, field, &mut TerminalPrompter, &mut session)?;
            println!("{value}");
            Ok(())
        }
        None => {
            let Some(values) = connections.get(bundle)? else {
                return print_json(&Value::Null);
            };
            print_json(&serde_json::to_value(values)?)
        }
    }
}

/// `avault connection set BUNDLE FIELD=VALUE...`
fn cmd_connection_set(vault: &Vault, bundle: &str, pairs: &[String]) -> Result<()> {
    let mut values = Credentials::new();
    for pair in pairs {
        let (field, value) = pair
            .split_once('=')
            .ok_or_else(|| anyhow!("expected FIELD=VALUE, got '{pair}'"))?;
        if field.is_empty() {
            return Err(anyhow!("empty field name in '{pair}'"));
        }
        values.insert(field.to_string(), value.to_string());
    }
    vault.connections().set(bundle, &values)?;
    println!("wrote {} field(s) to '{bundle}'", values.len());
    Ok(())
}

fn require_identity(
    vault: &Vault,
    name: Option<String>,
) -> Result<agentic_vault::IdentityKey> {
    let identities = vault.identities();
    let name = name.unwrap_or_else(|| identities.active_name().to_string());
    identities
        .load(&name)?
        .ok_or_else(|| anyhow!("identity key '{name}' not found"))
}

/// `avault identity generate [NAME]`
fn cmd_identity_generate(vault: &Vault, name: Option<String>) -> Result<()> {
    let identities = vault.identities();
    let name = name.unwrap_or_else(|| identities.active_name().to_string());
    let key = identities.create(&name)?;
    println!("Created identity key '{name}'");
    println!("  DID:  {}", key.did());
    println!(
        "  File: {}",
        vault.layout().identity_key_path(&name)?.display()
    );
    Ok(())
}

/// `avault identity show [NAME]`
fn cmd_identity_show(vault: &Vault, name: Option<String>) -> Result<()> {
    let key = require_identity(vault, name)?;
    println!("Identity: {}", key.name());
    println!("  DID:     {}", key.did());
    println!("  Tag:     {}", key.tag());
    println!("  Created: {}", key.created_at());
    if key.name() == vault.identities().active_name() {
        println!("  Active:  yes");
    }
    Ok(())
}

/// `avault keyring list`
fn cmd_keyring_list(vault: &Vault) -> Result<()> {
    let keyring = vault.keyring();
    let pairs = keyring.discover()?;
    if pairs.is_empty() {
        println!("No signing keys found in {}", keyring.dir().display());
        return Ok(());
    }

    println!("{:<20} FINGERPRINT", "NAME");
    println!("{}", "-".repeat(72));
    for files in &pairs {
        match keyring.fingerprint(files) {
            Ok(fp) => println!("{:<20} {fp}", files.name),
            Err(e) => println!("{:<20} (failed to read: {e})", files.name),
        }
    }
    Ok(())
}

/// `avault keyring create NAME [--comment TEXT]`
fn cmd_keyring_create(vault: &Vault, name: &str, comment: &str) -> Result<()> {
    let passphrase = read_line("Enter passphrase for new signing key: ")?;
    if passphrase.is_empty() {
        return Err(anyhow!("passphrase cannot be empty"));
    }
    let confirm = read_line("Confirm passphrase: ")?;
    if passphrase != confirm {
        return Err(anyhow!("passphrases do not match"));
    }

    let keyring = vault.keyring();
    let files = keyring.create(name, &passphrase, comment)?;
    println!("Created signing key '{name}'");
    println!("  File:        {}", files.private_path.display());
    println!("  Fingerprint: {}", keyring.fingerprint(&files)?);
    Ok(())
}
