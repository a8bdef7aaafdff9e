use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use autogrid_core::{Overrides, RecordProvider, RecordType, Table};
use autogrid_host::cli::{self, FormatAssignment};
use autogrid_host::export;
use autogrid_host::{build_grid, logging, CookieJar, GridRequest, HostConfig, JsonRecordProvider};
use clap::{Parser, ValueEnum};

#[derive(Clone, Debug, ValueEnum)]
enum OutputFormat {
    Text,
    Csv,
}

#[derive(Parser)]
#[command(about = "Render or export a JSON row set as a sortable, column-configurable grid.")]
struct Args {
    /// JSON file holding an array of row objects (`-` for stdin).
    rows: PathBuf,

    /// Columns to declare, e.g. `"first_name, last_name:Surname, address.city"`.
    #[arg(long)]
    columns: String,

    /// Record type name of the rows.
    #[arg(long = "type", default_value = "Record")]
    type_name: String,

    /// Backing table name (default: tableized type name).
    #[arg(long)]
    table_name: Option<String>,

    /// Associated record types available to nested column ids (repeatable).
    #[arg(long = "association")]
    associations: Vec<String>,

    /// Format assignment `<ids>=<tag>[:<style>]`, e.g. `amount=currency` (repeatable).
    #[arg(long = "format")]
    formats: Vec<String>,

    /// Persist a sort before rendering: `<id>` or `<id>:desc`.
    #[arg(long)]
    sort: Option<String>,

    /// `Cookie` request header carrying persisted preferences.
    #[arg(long, env = "AUTOGRID_COOKIE")]
    cookie: Option<String>,

    /// Host config file (JSON).
    #[arg(long, env = "AUTOGRID_CONFIG")]
    config: Option<PathBuf>,

    #[arg(long, default_value = "cli")]
    controller: String,

    #[arg(long, default_value = "export")]
    action: String,

    /// Restrict the record query to declared columns.
    #[arg(long)]
    auto_select: bool,

    /// Output format.
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    output: OutputFormat,

    /// Print the `Set-Cookie` values the grid produced to stderr.
    #[arg(long)]
    show_cookies: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => HostConfig::from_path(path)?,
        None => HostConfig::default(),
    };
    logging::init(&config.log)?;

    let mut root = RecordType::new(args.type_name.as_str());
    if let Some(table_name) = &args.table_name {
        root = root.with_table_name(table_name.as_str());
    }
    let mut provider = JsonRecordProvider::from_json_str(root.clone(), &read_rows(&args.rows)?)?;

    let jar = Arc::new(
        args.cookie
            .as_deref()
            .map_or_else(CookieJar::new, CookieJar::from_header),
    );
    let request = GridRequest::new(args.controller.as_str(), args.action.as_str(), jar.clone());

    let mut overrides = Overrides::new();
    if args.auto_select {
        overrides = overrides.flag("auto_select");
    }

    let formats = args
        .formats
        .iter()
        .map(|assignment| cli::parse_format(assignment))
        .collect::<Result<Vec<_>>>()?;

    let mut table = build_grid(&request, &config, root, &overrides, |table| {
        for association in &args.associations {
            table.register_type(RecordType::new(association.as_str()));
        }
        table.declare_columns(&args.columns, &Overrides::new())?;
        for FormatAssignment { ids, tag, options } in formats {
            table.format(ids, tag, options)?;
        }
        Ok(())
    })?;

    if let Some(sort) = &args.sort {
        let (id, ascending) = cli::parse_sort(sort)?;
        if !table.set_sort(id, ascending)? {
            anyhow::bail!("cannot sort by `{id}`: column is not declared");
        }
        table.invalidate();
    }

    let stdout = std::io::stdout();
    let mut handle = stdout.lock();
    match args.output {
        OutputFormat::Csv => export::write_csv(&mut table, &mut provider, &mut handle)?,
        OutputFormat::Text => write_text(&mut table, &mut provider, &mut handle)?,
    }

    if args.show_cookies {
        for header in jar.take_set_cookie_headers() {
            eprintln!("Set-Cookie: {header}");
        }
    }
    Ok(())
}

fn read_rows(path: &Path) -> Result<String> {
    if path.as_os_str() == "-" {
        let mut source = String::new();
        std::io::stdin()
            .read_to_string(&mut source)
            .context("failed to read rows from stdin")?;
        return Ok(source);
    }
    std::fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))
}

fn write_text(
    table: &mut Table,
    provider: &mut JsonRecordProvider,
    out: &mut impl Write,
) -> Result<()> {
    table.prepare(provider)?;
    writeln!(out, "{}", table.title())?;
    writeln!(out, "{}", table.export_headers()?.join(" | "))?;
    for row in provider.rows() {
        writeln!(out, "{}", table.render_row(row)?.join(" | "))?;
    }
    Ok(())
}
