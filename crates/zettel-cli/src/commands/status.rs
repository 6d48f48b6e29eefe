//! Status command handler

use anyhow::Result;

use zettel_core::{Config, DirectoryService, Entry, MetaKind};

use crate::output::{Output, OutputFormat};

/// Entry counts by kind
#[derive(Debug, Default, PartialEq, Eq)]
struct Summary {
    notes: usize,
    duplicates: usize,
    meta_file: usize,
    meta_header: usize,
    meta_none: usize,
    unknown: usize,
}

impl Summary {
    fn of(entries: &[Entry]) -> Self {
        let mut summary = Summary {
            notes: entries.len(),
            ..Summary::default()
        };
        for entry in entries {
            if entry.duplicates {
                summary.duplicates += 1;
            }
            match entry.meta_kind {
                MetaKind::File => summary.meta_file += 1,
                MetaKind::Header => summary.meta_header += 1,
                MetaKind::None => summary.meta_none += 1,
                MetaKind::Unknown => summary.unknown += 1,
            }
        }
        summary
    }
}

/// Show status information
pub async fn show(directory: &DirectoryService, config: &Config, output: &Output) -> Result<()> {
    let entries = directory.get_entries().await?;
    let summary = Summary::of(&entries);

    match output.format {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::json!({
                    "notes_dir": directory.notes_dir(),
                    "rescan_interval_secs": config.rescan_interval().as_secs(),
                    "counts": {
                        "notes": summary.notes,
                        "duplicates": summary.duplicates,
                        "meta": {
                            "file": summary.meta_file,
                            "header": summary.meta_header,
                            "none": summary.meta_none,
                            "unknown": summary.unknown
                        }
                    }
                })
            );
        }
        OutputFormat::Quiet => {
            println!("{}", summary.notes);
        }
        OutputFormat::Human => {
            println!("Zettel Status");
            println!("=============");
            println!();
            println!("Directory:");
            println!("  Location: {}", directory.notes_dir().display());
            println!("  Rescan:   every {}s", config.rescan_interval().as_secs());
            println!();
            println!("Contents:");
            println!("  Notes:      {}", summary.notes);
            println!("  Duplicates: {}", summary.duplicates);
            println!();
            println!("Metadata:");
            println!("  Meta file:  {}", summary.meta_file);
            println!("  Header:     {}", summary.meta_header);
            println!("  None:       {}", summary.meta_none);
            if summary.unknown > 0 {
                println!("  Unknown:    {}", summary.unknown);
            }
        }
    }

    Ok(())
}
