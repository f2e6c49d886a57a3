mod cli;

use std::collections::hash_map::DefaultHasher;
use std::fs;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use time::OffsetDateTime;
use time::macros::format_description;
use tracing_subscriber::EnvFilter;

use logsieve::graph::SortOrder;
use logsieve::index::{IndexedCommit, MemoryDetailIndex, SqliteCommitIndex, TopCommitsCache};
use logsieve::model::{CommitHash, FilterCollection};
use logsieve::provider::{GitProvider, read_repository};
use logsieve::visible::{DataPackBuilder, Filterer, VisiblePackRefresher};

use cli::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt().with_env_filter(EnvFilter::from_default_env()).init();
    let cli = Cli::parse();

    // One cache database per root set, keyed by the canonical paths.
    let cache_dir = dirs::cache_dir().context("Could not determine cache directory")?.join("logsieve");
    fs::create_dir_all(&cache_dir)?;

    let mut hasher = DefaultHasher::new();
    let mut roots = Vec::new();
    for root in &cli.roots {
        let canonical = fs::canonicalize(root)
            .with_context(|| format!("Could not resolve path: {}", root.display()))?;
        canonical.hash(&mut hasher);
        roots.push(canonical);
    }
    let first_name = roots
        .first()
        .and_then(|p| p.file_name())
        .and_then(|n| n.to_str())
        .unwrap_or("repo");
    let db_path = cache_dir.join(format!("{}_{:016x}.db", first_name, hasher.finish()));
    tracing::debug!(db = %db_path.display(), "using index");

    let db_path_str = db_path.to_str().context("Invalid path encoding")?;
    let index_db = SqliteCommitIndex::new(db_path_str).await?;
    index_db.init_schema().await?;

    let memory_index = Arc::new(MemoryDetailIndex::new());
    let cache = Arc::new(TopCommitsCache::default());

    // Load every root: topology and refs into the pack, metadata into the
    // index (reusing persisted rows when the head is unchanged).
    let mut builder = DataPackBuilder::new();
    for path in &roots {
        let root = builder.add_root(path.clone());
        let data = read_repository(path)
            .with_context(|| format!("Failed to read repository at {}", path.display()))?;

        for commit in &data.commits {
            builder.add_commit(root, commit.hash, &commit.parents, commit.timestamp);
        }
        for r in &data.refs {
            builder.add_ref(root, &r.name, r.hash, r.is_branch);
        }

        let root_key = path.to_string_lossy().into_owned();
        let records = if index_db.indexed_head(&root_key).await.as_deref()
            == Some(data.head_hex.as_str())
        {
            tracing::debug!(root = %root_key, "index is up to date, loading from cache");
            index_db.load_commits(&root_key).await?
        } else {
            index_db.apply_indexing(&root_key, &data.head_hex, &data.metadata).await?;
            data.metadata
        };
        for record in &records {
            let commit = builder.intern(root, CommitHash::from_bytes(record.oid));
            memory_index.add_commit(
                commit,
                IndexedCommit {
                    root,
                    author: record.author.clone(),
                    timestamp: record.timestamp,
                    message: record.message.clone(),
                },
            );
        }
        memory_index.mark_indexed(root);
        builder.set_provider(root, Arc::new(GitProvider::new(root, path.clone())));
    }
    let data_pack = builder.build();

    let mut filters = FilterCollection::empty();
    if !cli.branch.is_empty() {
        filters = filters.with_branch(cli.branch.clone());
    }
    if !cli.author.is_empty() {
        filters = filters.with_users(cli.author.clone());
    }
    if let Some(text) = &cli.text {
        filters = filters.with_text(text.clone());
    }
    if cli.after.is_some() || cli.before.is_some() {
        let after = cli.after.as_deref().map(parse_date).transpose()?;
        let before = cli.before.as_deref().map(parse_date).transpose()?;
        filters = filters.with_date(after, before);
    }
    if !cli.hashes.is_empty() {
        filters = filters.with_hashes(cli.hashes.clone());
    }

    let filterer = Filterer::new(memory_index.clone(), cache);
    let refresher = VisiblePackRefresher::new(filterer, SortOrder::Date);

    let (pack_tx, mut pack_rx) = tokio::sync::mpsc::unbounded_channel();
    let listener = refresher.add_visible_pack_change_listener(move |pack| {
        let _ = pack_tx.send(pack.clone());
    });

    refresher.on_filters_change(filters);
    refresher.on_refresh(data_pack);
    refresher.set_valid(true, true);

    let pack = pack_rx.recv().await.context("No visible pack was published")?;
    refresher.remove_visible_pack_change_listener(listener);

    if let Some(error) = pack.filter_error() {
        anyhow::bail!("filtering failed: {error}");
    }

    let visible = pack.visible_graph();
    let storage = pack.data_pack().storage();
    for row in 0..visible.commit_count().min(cli.max_rows) {
        let commit = visible.commit_at(row).expect("row within bounds");
        let id = storage.commit_id(commit);
        match memory_index.metadata_of(commit) {
            Some(meta) => println!(
                "{} {} {:20} {}",
                &id.hash.to_hex()[..8],
                format_timestamp(meta.timestamp),
                meta.author,
                meta.message.lines().next().unwrap_or(""),
            ),
            None => println!("{}", &id.hash.to_hex()[..8]),
        }
    }
    if visible.commit_count() > cli.max_rows {
        eprintln!("... {} more rows", visible.commit_count() - cli.max_rows);
    }
    if pack.can_request_more() {
        eprintln!("More matches may exist; a deeper scan could find them.");
    }

    refresher.shutdown().await;
    Ok(())
}

fn parse_date(s: &str) -> Result<OffsetDateTime> {
    let format = format_description!("[year]-[month]-[day]");
    let date = time::Date::parse(s, &format)
        .with_context(|| format!("Invalid date (expected YYYY-MM-DD): {s}"))?;
    Ok(date.midnight().assume_utc())
}

fn format_timestamp(timestamp: i64) -> String {
    let format = format_description!("[year]-[month]-[day]");
    OffsetDateTime::from_unix_timestamp(timestamp)
        .ok()
        .and_then(|dt| dt.format(&format).ok())
        .unwrap_or_else(|| "unknown".to_string())
}
