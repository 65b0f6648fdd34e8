//! Command-line administration of the unit tree.
//!
//! # Responsibility
//! - Load `.env`, read `UnitTreeConfig`, start logging and open the database.
//! - Map each subcommand onto one `unittree_core` service call.
//!
//! Commands bypass unit permissions; whoever can open the database
//! administers the tree.

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use log::info;
use std::collections::BTreeMap;
use std::path::PathBuf;
use unittree_core::render::PARAMETER_ID_CURRENT_UNIT;
use unittree_core::{
    open_db, GrantTable, HtmlTreeRenderer, RequestParams, SectorAttributeHandler,
    TreeRenderer, Unit, UnitAttributeRegistry, UnitService, UnitTreeConfig, UnitUserService,
};

#[derive(Parser)]
#[command(name = "unittree")]
#[command(about = "Unit tree administration")]
#[command(version)]
struct Cli {
    #[arg(long, global = true, help = "Database file, overrides UNITTREE_DB_PATH")]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Print the unit tree as XML")]
    Tree,

    #[command(about = "Print the unit tree as HTML")]
    Html {
        #[arg(long, help = "Unit to highlight")]
        current: Option<i32>,
    },

    #[command(about = "Create a unit")]
    Create {
        #[arg(long, default_value_t = 0)]
        parent: i32,
        #[arg(long)]
        label: String,
        #[arg(long)]
        description: String,
        #[arg(long = "sector", help = "Sector owned by the new unit, repeatable")]
        sectors: Vec<i32>,
    },

    #[command(about = "Change label and description of a unit")]
    Update {
        id: i32,
        #[arg(long)]
        label: String,
        #[arg(long)]
        description: String,
    },

    #[command(about = "Move a unit and its subtree under another unit")]
    Move { id: i32, parent: i32 },

    #[command(about = "Remove a unit without children")]
    Remove { id: i32 },

    #[command(about = "Assign users to a unit")]
    Assign {
        unit: i32,
        #[arg(required = true)]
        users: Vec<i32>,
    },

    #[command(about = "Detach a user from its unit")]
    Unassign { user: i32 },

    #[command(about = "Check core linkage")]
    Ping,
}

fn main() -> anyhow::Result<()> {
    if let Err(err) = dotenvy::dotenv() {
        if !err.not_found() {
            return Err(err.into());
        }
    }
    let cli = Cli::parse();

    if let Commands::Ping = cli.command {
        println!("unittree_core ping={}", unittree_core::ping());
        println!("unittree_core version={}", unittree_core::core_version());
        return Ok(());
    }

    let mut config = UnitTreeConfig::from_env()?;
    if let Some(db) = cli.db {
        config.database_path = db;
    }
    config.init_logging()?;

    let conn = open_db(&config.database_path)
        .with_context(|| format!("opening {}", config.database_path.display()))?;
    let units = UnitService::new(
        &conn,
        UnitAttributeRegistry::with_builtin_handlers(),
        GrantTable::new(),
    )?;
    let unit_users = UnitUserService::new(&conn)?;

    match cli.command {
        Commands::Tree => println!("{}", units.get_xml_units()?),
        Commands::Html { current } => {
            let mut parameters = BTreeMap::new();
            if let Some(current) = current {
                parameters.insert(PARAMETER_ID_CURRENT_UNIT.to_string(), current.to_string());
            }
            let html = HtmlTreeRenderer::default().render(&units.get_xml_units()?, &parameters)?;
            println!("{html}");
        }
        Commands::Create {
            parent,
            label,
            description,
            sectors,
        } => {
            let mut params = RequestParams::new();
            for sector in sectors {
                params.insert(SectorAttributeHandler::PARAMETER_ID_SECTORS, sector.to_string());
            }
            let mut unit = Unit::new(parent, label, description);
            let id = units.create_unit(&mut unit, &params)?;
            println!("{id}");
        }
        Commands::Update {
            id,
            label,
            description,
        } => {
            let Some(mut unit) = units.get_unit(id, false)? else {
                bail!("unit not found: {id}");
            };
            unit.label = label;
            unit.description = description;
            units.update_unit(&unit, &RequestParams::new())?;
        }
        Commands::Move { id, parent } => {
            let (Some(mut unit), Some(new_parent)) =
                (units.get_unit(id, false)?, units.get_unit(parent, false)?)
            else {
                bail!("unit not found: {id} or {parent}");
            };
            if !units.move_sub_tree(&mut unit, &new_parent)? {
                bail!("cannot move unit {id} under {parent}");
            }
        }
        Commands::Remove { id } => {
            if !units.remove_unit(id)? {
                bail!("unit {id} is the root, has sub-units or does not exist");
            }
        }
        Commands::Assign { unit, users } => {
            for user in users {
                if !unit_users.add_user_to_unit(unit, user)? {
                    bail!("user {user} already belongs to a unit");
                }
            }
        }
        Commands::Unassign { user } => {
            if !unit_users.remove_user_from_unit(user)? {
                bail!("user {user} belongs to no unit");
            }
        }
        Commands::Ping => {}
    }

    info!(
        "event=cli_command module=cli status=ok db_path={}",
        config.database_path.display()
    );
    Ok(())
}
