use alder_config::AlderConfig;
use alder_core::DatabaseSchema;
use alder_db::SchemaCache;

use crate::cli::GlobalFlags;
use crate::cli::root_commands::SchemaArgs;
use crate::output::output;

/// Handle `alder schema <db_id>`.
pub fn handle(args: &SchemaArgs, config: &AlderConfig, flags: &GlobalFlags) -> anyhow::Result<()> {
    let schemas = SchemaCache::new(&config.search.db_root_dir);
    let schema = schemas.get(&args.db_id)?;
    if args.tables.is_empty() {
        return output(schema.as_ref(), flags.format);
    }

    let mut filtered = DatabaseSchema::default();
    for wanted in &args.tables {
        let Some((name, table)) = schema.table(wanted) else {
            anyhow::bail!("table '{wanted}' not found in '{}'", args.db_id);
        };
        filtered.tables.insert(name.to_string(), table.clone());
    }
    output(&filtered, flags.format)
}
