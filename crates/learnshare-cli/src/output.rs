//! Table, tree and JSON output for CLI commands.

use serde::Serialize;
use tabled::{Table, Tabled};

use learnshare_entity::category::{CategoryStatus, CategoryTreeNode};

/// Output format selection
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable table
    #[default]
    Table,
    /// JSON output
    Json,
}

/// Print a list of items in the selected format
pub fn print_list<T: Serialize + Tabled>(items: &[T], format: OutputFormat) {
    match format {
        OutputFormat::Table => {
            if items.is_empty() {
                println!("No results found.");
            } else {
                println!("{}", Table::new(items));
            }
        }
        OutputFormat::Json => print_json(items, "[]"),
    }
}

/// Print a single serializable value as JSON.
pub fn print_json<T: Serialize + ?Sized>(item: &T, fallback: &str) {
    let json = serde_json::to_string_pretty(item).unwrap_or_else(|_| fallback.to_string());
    println!("{json}");
}

/// Print nested category trees, one branch per line.
pub fn print_forest(forest: &[CategoryTreeNode], format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(forest, "[]"),
        OutputFormat::Table if forest.is_empty() => println!("No results found."),
        OutputFormat::Table => {
            for tree in forest {
                print_branch(tree, "", true, true);
            }
        }
    }
}

fn print_branch(node: &CategoryTreeNode, prefix: &str, last: bool, root: bool) {
    let marker = if node.status == CategoryStatus::Active { "" } else { " (inactive)" };
    if root {
        println!("{} [{}] ({} docs){}", node.name, node.id, node.document_count, marker);
    } else {
        let joint = if last { "└── " } else { "├── " };
        println!(
            "{prefix}{joint}{} [{}] ({} docs){}",
            node.name, node.id, node.document_count, marker
        );
    }
    let child_prefix = match (root, last) {
        (true, _) => String::new(),
        (false, true) => format!("{prefix}    "),
        (false, false) => format!("{prefix}│   "),
    };
    for (i, child) in node.children.iter().enumerate() {
        print_branch(child, &child_prefix, i + 1 == node.children.len(), false);
    }
}

/// Print a success message
pub fn print_success(msg: &str) {
    println!("✓ {}", msg);
}

/// Print a warning message
pub fn print_warning(msg: &str) {
    eprintln!("⚠ {}", msg);
}

/// Print an error message
pub fn print_error(msg: &str) {
    eprintln!("✗ {}", msg);
}

/// Print a key-value pair
pub fn print_kv(key: &str, value: &str) {
    println!("  {:<20} {}", format!("{}:", key), value);
}
