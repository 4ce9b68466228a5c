//! Category hierarchy CLI commands.

use clap::{Args, Subcommand, ValueEnum};
use serde::Serialize;
use tabled::Tabled;

use crate::output::{self, OutputFormat};
use learnshare_core::config::AppConfig;
use learnshare_core::error::AppError;
use learnshare_core::types::{CategoryId, DeletePolicy, DocumentId};
use learnshare_database::HierarchyStores;
use learnshare_entity::category::{CategoryDto, CategoryStatus};
use learnshare_service::{
    BulkReport, CategoryService, CreateCategoryRequest, UpdateCategoryRequest,
};

/// Arguments for category commands
#[derive(Debug, Args)]
pub struct CategoryArgs {
    /// Category subcommand
    #[command(subcommand)]
    pub command: CategoryCommand,
}

/// Which categories `list` shows
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ListFilter {
    /// Every live category, newest first
    All,
    /// Live roots
    Roots,
    /// Live active roots
    Active,
    /// Soft-deleted categories
    Deleted,
}

/// Status values accepted on the command line
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum StatusArg {
    /// Shown to readers
    Active,
    /// Hidden from readers
    Inactive,
}

impl From<StatusArg> for CategoryStatus {
    fn from(value: StatusArg) -> Self {
        match value {
            StatusArg::Active => Self::Active,
            StatusArg::Inactive => Self::Inactive,
        }
    }
}

/// Category subcommands
#[derive(Debug, Subcommand)]
pub enum CategoryCommand {
    /// List categories
    List {
        /// Which categories to list
        #[arg(long, value_enum, default_value = "roots")]
        filter: ListFilter,
    },
    /// List the direct children of a category
    Children {
        /// Parent category ID
        id: i64,
    },
    /// Show one category
    Show {
        /// Category ID
        id: i64,
    },
    /// Show a category subtree, or every root when no ID is given
    Tree {
        /// Subtree root
        id: Option<i64>,
        /// Levels shown below the root
        #[arg(short, long)]
        depth: Option<u32>,
    },
    /// Show the upload picker tree
    Picker,
    /// Show the path from the root to a category
    Breadcrumb {
        /// Category ID
        id: i64,
    },
    /// Create a category
    Create {
        /// Display name
        #[arg(short, long)]
        name: String,
        /// Slug (generated from the name when omitted)
        #[arg(short, long)]
        slug: Option<String>,
        /// Description
        #[arg(long)]
        description: Option<String>,
        /// Parent category ID (omit for root)
        #[arg(short, long)]
        parent_id: Option<i64>,
        /// Sibling position
        #[arg(long)]
        sort_order: Option<i32>,
        /// Initial status
        #[arg(long, value_enum)]
        status: Option<StatusArg>,
    },
    /// Rename a category
    Rename {
        /// Category ID
        id: i64,
        /// New name
        name: String,
    },
    /// Set or clear the description of a category
    Describe {
        /// Category ID
        id: i64,
        /// New description
        #[arg(conflicts_with = "clear")]
        description: Option<String>,
        /// Remove the description
        #[arg(long)]
        clear: bool,
    },
    /// Set or toggle the status of a category
    Status {
        /// Category ID
        id: i64,
        /// New status; flips the current one when omitted
        #[arg(value_enum)]
        status: Option<StatusArg>,
    },
    /// Change the sibling position of a category
    Reorder {
        /// Category ID
        id: i64,
        /// New sort order
        #[arg(allow_negative_numbers = true)]
        sort_order: i32,
    },
    /// Move a category and its subtree
    Move {
        /// Category ID
        id: i64,
        /// New parent ID (omit to make it a root)
        #[arg(short, long)]
        parent_id: Option<i64>,
    },
    /// Soft-delete one or more categories
    Delete {
        /// Category IDs
        #[arg(required = true)]
        ids: Vec<i64>,
        /// block_if_nonempty, cascade or promote_children
        #[arg(long)]
        policy: Option<String>,
    },
    /// Restore soft-deleted categories
    Restore {
        /// Category IDs
        #[arg(required = true)]
        ids: Vec<i64>,
        /// Reattach under this live parent (single ID only)
        #[arg(short, long)]
        parent_id: Option<i64>,
    },
    /// Permanently remove soft-deleted categories
    Purge {
        /// Category IDs
        #[arg(required = true)]
        ids: Vec<i64>,
        /// Skip confirmation prompt
        #[arg(long)]
        force: bool,
    },
    /// Attach a document to a category
    Assign {
        /// Document ID
        document_id: i64,
        /// Category ID
        category_id: i64,
    },
    /// Detach a document from a category
    Unassign {
        /// Document ID
        document_id: i64,
        /// Category ID
        category_id: i64,
    },
    /// Check the closure index for corruption
    Verify,
}

/// Category display row
#[derive(Debug, Serialize, Tabled)]
struct CategoryRow {
    /// Category ID
    id: i64,
    /// Name
    name: String,
    /// Slug
    slug: String,
    /// Status
    status: String,
    /// Parent ID
    parent: String,
    /// Depth
    level: i32,
    /// Documents in the subtree
    documents: u64,
    /// Direct children
    children: u64,
    /// Created or deleted at
    timestamp: String,
}

impl From<&CategoryDto> for CategoryRow {
    fn from(c: &CategoryDto) -> Self {
        let at = c.deleted_at.unwrap_or(c.created_at);
        Self {
            id: c.id.0,
            name: c.name.clone(),
            slug: c.slug.clone(),
            status: c.status.to_string(),
            parent: c.parent_id.map(|p| p.to_string()).unwrap_or_else(|| "-".to_string()),
            level: c.level,
            documents: c.document_count,
            children: c.subcategory_count,
            timestamp: at.format("%Y-%m-%d %H:%M").to_string(),
        }
    }
}

/// Execute category commands
pub async fn execute(
    args: &CategoryArgs,
    config: &AppConfig,
    format: OutputFormat,
) -> Result<(), AppError> {
    let stores = HierarchyStores::open(config).await?;
    let service = CategoryService::from_stores(&stores, config);

    let result = run(&args.command, &service, format).await;
    if let Some(db) = &stores.pool {
        db.close().await;
    }
    result
}

async fn run(
    command: &CategoryCommand,
    service: &CategoryService,
    format: OutputFormat,
) -> Result<(), AppError> {
    match command {
        CategoryCommand::List { filter } => {
            let categories = match filter {
                ListFilter::All => service.get_all_categories().await?,
                ListFilter::Roots => service.get_root_categories().await?,
                ListFilter::Active => service.get_active_root_categories().await?,
                ListFilter::Deleted => service.get_deleted_categories().await?,
            };
            print_categories(&categories, format);
        }
        CategoryCommand::Children { id } => {
            let children = service.get_children(CategoryId(*id)).await?;
            print_categories(&children, format);
        }
        CategoryCommand::Show { id } => {
            let category = service.get_category(CategoryId(*id)).await?;
            match format {
                OutputFormat::Json => output::print_json(&category, "{}"),
                OutputFormat::Table => {
                    output::print_kv("ID", &category.id.to_string());
                    output::print_kv("Name", &category.name);
                    output::print_kv("Slug", &category.slug);
                    output::print_kv("Status", category.status.as_str());
                    output::print_kv(
                        "Parent",
                        &category
                            .parent_id
                            .map(|p| p.to_string())
                            .unwrap_or_else(|| "-".to_string()),
                    );
                    output::print_kv("Level", &category.level.to_string());
                    output::print_kv("Documents", &category.document_count.to_string());
                    output::print_kv("Subcategories", &category.subcategory_count.to_string());
                    if let Some(description) = &category.description {
                        output::print_kv("Description", description);
                    }
                }
            }
        }
        CategoryCommand::Tree { id, depth } => {
            let roots = match id {
                Some(id) => vec![CategoryId(*id)],
                None => service
                    .get_root_categories()
                    .await?
                    .into_iter()
                    .map(|c| c.id)
                    .collect(),
            };
            let mut forest = Vec::with_capacity(roots.len());
            for root in roots {
                if let Some(tree) = service.get_subcategories_tree(root, *depth).await? {
                    forest.push(tree);
                }
            }
            output::print_forest(&forest, format);
        }
        CategoryCommand::Picker => {
            let forest = service.get_picker_tree().await?;
            output::print_forest(&forest, format);
        }
        CategoryCommand::Breadcrumb { id } => {
            let crumbs = service.get_breadcrumb(CategoryId(*id)).await?;
            match format {
                OutputFormat::Json => output::print_json(&crumbs, "[]"),
                OutputFormat::Table if crumbs.is_empty() => println!("No results found."),
                OutputFormat::Table => {
                    let path: Vec<&str> = crumbs.iter().map(|c| c.name.as_str()).collect();
                    println!("{}", path.join(" › "));
                }
            }
        }
        CategoryCommand::Create {
            name,
            slug,
            description,
            parent_id,
            sort_order,
            status,
        } => {
            let category = service
                .create_category(CreateCategoryRequest {
                    name: name.clone(),
                    slug: slug.clone(),
                    description: description.clone(),
                    status: status.map(CategoryStatus::from),
                    sort_order: *sort_order,
                    parent_id: parent_id.map(CategoryId),
                })
                .await?;
            output::print_success(&format!(
                "Category '{}' created (id: {}, slug: {})",
                category.name, category.id, category.slug
            ));
        }
        CategoryCommand::Rename { id, name } => {
            let category = service.rename_category(CategoryId(*id), name).await?;
            output::print_success(&format!("Category {} renamed to '{}'", category.id, category.name));
        }
        CategoryCommand::Describe {
            id,
            description,
            clear,
        } => {
            if description.is_none() && !clear {
                return Err(AppError::validation(
                    "Provide a description or pass --clear",
                ));
            }
            let category = service
                .update_category(
                    CategoryId(*id),
                    UpdateCategoryRequest {
                        description: description.clone(),
                        clear_description: *clear,
                        ..Default::default()
                    },
                )
                .await?;
            match &category.description {
                Some(_) => output::print_success(&format!("Category {} description updated", category.id)),
                None => output::print_success(&format!("Category {} description cleared", category.id)),
            }
        }
        CategoryCommand::Status { id, status } => {
            let category = match status {
                Some(status) => service.update_status(CategoryId(*id), (*status).into()).await?,
                None => service.toggle_status(CategoryId(*id)).await?,
            };
            output::print_success(&format!("Category {} is now {}", category.id, category.status));
        }
        CategoryCommand::Reorder { id, sort_order } => {
            let category = service.reorder(CategoryId(*id), *sort_order).await?;
            output::print_success(&format!(
                "Category {} sort order set to {}",
                category.id, category.sort_order
            ));
        }
        CategoryCommand::Move { id, parent_id } => {
            let outcome = service
                .move_category(CategoryId(*id), parent_id.map(CategoryId))
                .await?;
            match format {
                OutputFormat::Json => output::print_json(&outcome, "{}"),
                OutputFormat::Table => output::print_success(&format!(
                    "Moved {} categories under {} ({} rows removed, {} inserted)",
                    outcome.subtree_size,
                    outcome
                        .new_parent_id
                        .map(|p| p.to_string())
                        .unwrap_or_else(|| "the root level".to_string()),
                    outcome.edges_removed,
                    outcome.edges_inserted
                )),
            }
        }
        CategoryCommand::Delete { ids, policy } => {
            let policy = policy
                .as_deref()
                .map(str::parse::<DeletePolicy>)
                .transpose()?;
            if let [id] = ids.as_slice() {
                let outcome = service.delete_category(CategoryId(*id), policy).await?;
                match format {
                    OutputFormat::Json => output::print_json(&outcome, "{}"),
                    OutputFormat::Table => output::print_success(&format!(
                        "Deleted {} categories ({} promoted) under {}",
                        outcome.deleted.len(),
                        outcome.promoted.len(),
                        outcome.policy
                    )),
                }
            } else {
                let ids: Vec<CategoryId> = ids.iter().copied().map(CategoryId).collect();
                let outcomes = service.delete_categories(&ids, policy).await?;
                match format {
                    OutputFormat::Json => output::print_json(&outcomes, "[]"),
                    OutputFormat::Table => {
                        for outcome in &outcomes {
                            let Some(root) = outcome.deleted.first() else {
                                continue;
                            };
                            output::print_success(&format!(
                                "Category {root} deleted ({} categories, {} promoted)",
                                outcome.deleted.len(),
                                outcome.promoted.len()
                            ));
                        }
                    }
                }
            }
        }
        CategoryCommand::Restore { ids, parent_id } => {
            if let [id] = ids.as_slice() {
                let category = service
                    .restore_category(CategoryId(*id), parent_id.map(CategoryId))
                    .await?;
                output::print_success(&format!("Category '{}' restored", category.name));
            } else {
                if parent_id.is_some() {
                    return Err(AppError::validation(
                        "--parent-id can only be used when restoring a single category",
                    ));
                }
                let ids: Vec<CategoryId> = ids.iter().copied().map(CategoryId).collect();
                let report = service.restore_categories(&ids).await;
                print_bulk(&report, "restored", format)?;
            }
        }
        CategoryCommand::Purge { ids, force } => {
            if !force {
                let listed: Vec<String> = ids.iter().map(i64::to_string).collect();
                let confirm = dialoguer::Confirm::new()
                    .with_prompt(format!(
                        "Permanently remove categories {} and their document assignments?",
                        listed.join(", ")
                    ))
                    .default(false)
                    .interact()
                    .map_err(|e| AppError::internal(format!("Input error: {e}")))?;

                if !confirm {
                    println!("Cancelled.");
                    return Ok(());
                }
            }
            let ids: Vec<CategoryId> = ids.iter().copied().map(CategoryId).collect();
            let outcome = service.purge_categories(&ids).await?;
            match format {
                OutputFormat::Json => output::print_json(&outcome, "{}"),
                OutputFormat::Table => {
                    for category in &outcome.purged {
                        output::print_success(&format!("Category '{}' purged", category.name));
                    }
                    output::print_kv(
                        "Assignments removed",
                        &outcome.assignments_removed.to_string(),
                    );
                }
            }
        }
        CategoryCommand::Assign {
            document_id,
            category_id,
        } => {
            let added = service
                .assign_document(DocumentId(*document_id), CategoryId(*category_id))
                .await?;
            if added {
                output::print_success(&format!(
                    "Document {document_id} assigned to category {category_id}"
                ));
            } else {
                output::print_warning("Document was already assigned.");
            }
        }
        CategoryCommand::Unassign {
            document_id,
            category_id,
        } => {
            let removed = service
                .unassign_document(DocumentId(*document_id), CategoryId(*category_id))
                .await?;
            if removed {
                output::print_success(&format!(
                    "Document {document_id} removed from category {category_id}"
                ));
            } else {
                output::print_warning("Document was not assigned.");
            }
        }
        CategoryCommand::Verify => {
            let report = service.verify_integrity().await?;
            match format {
                OutputFormat::Json => output::print_json(&report, "{}"),
                OutputFormat::Table => {
                    output::print_kv("Categories", &report.live_categories.to_string());
                    output::print_kv("Closure rows", &report.edges.to_string());
                    for violation in &report.violations {
                        output::print_error(&violation.to_string());
                    }
                }
            }
            if !report.is_consistent() {
                return Err(AppError::consistency(report.summary()));
            }
            output::print_success("Closure index is consistent.");
        }
    }

    Ok(())
}

fn print_categories(categories: &[CategoryDto], format: OutputFormat) {
    let rows: Vec<CategoryRow> = categories.iter().map(CategoryRow::from).collect();
    output::print_list(&rows, format);
}

/// Print a bulk report; fails when any id failed.
fn print_bulk(report: &BulkReport, verb: &str, format: OutputFormat) -> Result<(), AppError> {
    match format {
        OutputFormat::Json => output::print_json(report, "{}"),
        OutputFormat::Table => {
            for id in &report.succeeded {
                output::print_success(&format!("Category {id} {verb}"));
            }
            for failure in &report.failed {
                output::print_error(&format!("Category {}: {}", failure.id, failure.message));
            }
        }
    }
    match report.failed.first() {
        None => Ok(()),
        Some(first) => Err(AppError::new(
            first.kind,
            format!(
                "{} of {} categories could not be {verb}",
                report.failed.len(),
                report.failed.len() + report.succeeded.len()
            ),
        )),
    }
}
