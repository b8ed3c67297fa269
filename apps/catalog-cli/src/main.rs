//! catalog-cli: command-line driver for the dental course catalog.
//!
//! Wires the catalog service to a storage backend chosen from the
//! environment and exposes its operations as subcommands. Records are read
//! and printed as JSON in the same camelCase shape the store persists.
//!
//! Run:
//! ```bash
//! # add a course from a draft file, acting as the configured user
//! cargo run -p catalog-cli -- add --file draft.json
//!
//! # list courses with JSON logs, against a throwaway in-memory store
//! STORAGE_PROVIDER=memory LOG_FORMAT=json cargo run -p catalog-cli -- list
//! ```
//!
//! Configuration: See `config.rs` for all environment variables.

mod config;

use std::io::Read;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use domain::adapters::log_notifier::LogNotifier;
use domain::adapters::memory_repo::{InMemoryCourseRepo, InMemoryTaxonomyRepo, StaticInstructors};
use domain::jalali::{gregorian_to_jalali, jalali_to_gregorian};
use domain::service::CatalogService;
use domain::slug::slugify;
use domain::{
    Course, CourseDraft, CourseRepository, CourseType, CourseUpdate, Currency, CurrentUser,
    InstructorDirectory, Notifier, Role, TaxonomyRepository,
};
use serde::de::DeserializeOwned;
use serde::Serialize;
use sqlite_adapter::SqliteRepo;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Debug, Parser)]
#[command(name = "catalog-cli")]
#[command(about = "Manage the dental course catalog")]
struct Cli {
    /// Acting user name (defaults to CATALOG_USER)
    #[arg(long, global = true)]
    user: Option<String>,
    /// Acting role (defaults to CATALOG_ROLE)
    #[arg(long, global = true, value_parser = parse_role)]
    role: Option<Role>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Add a course from a JSON draft (`-` reads stdin)
    Add {
        #[arg(long)]
        file: PathBuf,
    },
    /// Edit fields of a stored course
    Update(UpdateArgs),
    /// Delete a course by id
    Delete { id: u64 },
    /// Replace the whole catalog with a JSON array of courses
    Import {
        #[arg(long)]
        file: PathBuf,
    },
    /// Print valid courses, optionally only the one with a given slug
    List {
        #[arg(long)]
        slug: Option<String>,
    },
    /// Print one course by id
    Show { id: u64 },
    /// Count one enrollment against a course
    Enroll { id: u64 },
    /// Report stored courses that no longer validate
    Audit,
    /// Print a lookup list
    Lookup {
        #[arg(value_enum)]
        list: LookupList,
    },
    /// Manage the instructor directory (sqlite storage only)
    Instructor {
        #[command(subcommand)]
        action: InstructorAction,
    },
    /// Convert a date between calendars
    Convert {
        #[command(subcommand)]
        direction: ConvertDirection,
    },
    /// Print the slug a title would produce
    Slugify { title: String },
}

#[derive(Debug, clap::Args)]
struct UpdateArgs {
    id: u64,
    #[arg(long)]
    title: Option<String>,
    #[arg(long)]
    instructor: Option<String>,
    #[arg(long)]
    description: Option<String>,
    #[arg(long)]
    category: Option<String>,
    #[arg(long)]
    university: Option<String>,
    #[arg(long, value_parser = parse_course_type)]
    course_type: Option<CourseType>,
    #[arg(long)]
    price: Option<String>,
    #[arg(long, value_parser = parse_currency)]
    currency: Option<Currency>,
    #[arg(long, conflicts_with_all = ["discount_price", "clear_discount"])]
    discount_percentage: Option<f64>,
    #[arg(long, conflicts_with = "clear_discount")]
    discount_price: Option<String>,
    #[arg(long)]
    clear_discount: bool,
    /// New start date as YYYY/MM/DD (Jalali)
    #[arg(long)]
    start_date: Option<String>,
    /// New start date as YYYY-MM-DD (Gregorian)
    #[arg(long, conflicts_with = "start_date")]
    start_date_gregorian: Option<String>,
    /// Comma separated country list
    #[arg(long, value_delimiter = ',')]
    countries: Option<Vec<String>>,
    #[arg(long, value_delimiter = ',')]
    tags: Option<Vec<String>>,
    #[arg(long)]
    open: Option<bool>,
    #[arg(long)]
    featured: Option<bool>,
}

impl UpdateArgs {
    fn into_update(self) -> CourseUpdate {
        let mut u = CourseUpdate::new();
        if let Some(v) = self.title {
            u = u.title(v);
        }
        if let Some(v) = self.instructor {
            u = u.instructor(v);
        }
        if let Some(v) = self.description {
            u = u.description(v);
        }
        if let Some(v) = self.category {
            u = u.category(v);
        }
        if let Some(v) = self.university {
            u = u.university(v);
        }
        if let Some(v) = self.course_type {
            u = u.course_type(v);
        }
        if let Some(v) = self.price {
            u = u.price(v);
        }
        if let Some(v) = self.currency {
            u = u.currency(v);
        }
        if let Some(v) = self.discount_percentage {
            u = u.discount_percentage(v);
        }
        if let Some(v) = self.discount_price {
            u = u.discount_price(v);
        }
        if self.clear_discount {
            u = u.clear_discount();
        }
        if let Some(v) = self.start_date {
            u = u.start_date_jalali(v);
        }
        if let Some(v) = self.start_date_gregorian {
            u = u.start_date_gregorian(v);
        }
        if let Some(v) = self.countries {
            u = u.countries(v);
        }
        if let Some(v) = self.tags {
            u = u.tags(v);
        }
        if let Some(v) = self.open {
            u = u.is_open(v);
        }
        if let Some(v) = self.featured {
            u = u.is_featured(v);
        }
        u
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LookupList {
    Categories,
    Universities,
    Countries,
    Instructors,
}

#[derive(Debug, Subcommand)]
enum InstructorAction {
    Add { name: String },
    Remove { name: String },
}

#[derive(Debug, Subcommand)]
enum ConvertDirection {
    /// Jalali YYYY/MM/DD to Gregorian YYYY-MM-DD
    ToGregorian { date: String },
    /// Gregorian YYYY-MM-DD to Jalali YYYY/MM/DD
    ToJalali { date: String },
}

fn parse_role(s: &str) -> Result<Role, String> {
    Role::parse(s).ok_or_else(|| format!("unknown role '{s}'"))
}

fn parse_course_type(s: &str) -> Result<CourseType, String> {
    CourseType::parse(s).ok_or_else(|| format!("unknown course type '{s}'"))
}

fn parse_currency(s: &str) -> Result<Currency, String> {
    Currency::parse(s).ok_or_else(|| format!("unknown currency '{s}'"))
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let cfg = config::Config::from_env()?;
    init_tracing(&cfg);
    cfg.warn_if_ephemeral();

    let user = CurrentUser::new(
        cli.user.clone().unwrap_or_else(|| cfg.user.clone()),
        cli.role.unwrap_or(cfg.role),
    );
    info!(user = %user.name, role = user.role.as_str(), "catalog-cli starting");

    match cli.command {
        // Commands that never touch storage.
        Command::Convert { direction } => convert(direction),
        Command::Slugify { title } => {
            println!("{}", slugify(&title));
            Ok(())
        }
        Command::Instructor { action } => {
            if cfg.storage_provider != config::StorageProvider::Sqlite {
                bail!("the instructor directory is only persisted with STORAGE_PROVIDER=sqlite");
            }
            let repo = open_sqlite(&cfg.db_path)?;
            manage_instructors(&repo, &user, action)
        }
        command => match cfg.storage_provider {
            config::StorageProvider::Sqlite => {
                let svc = CatalogService::new(
                    open_sqlite(&cfg.db_path)?,
                    open_sqlite(&cfg.db_path)?,
                    open_sqlite(&cfg.db_path)?,
                    LogNotifier,
                );
                run(&svc, &user, command)
            }
            config::StorageProvider::Memory => {
                let svc = CatalogService::new(
                    InMemoryCourseRepo::new(),
                    InMemoryTaxonomyRepo::new(),
                    StaticInstructors::from_names(cfg.instructors.clone()),
                    LogNotifier,
                );
                run(&svc, &user, command)
            }
        },
    }
}

fn init_tracing(cfg: &config::Config) {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    // Logs go to stderr so stdout stays machine-readable JSON.
    let registry = tracing_subscriber::registry().with(env_filter);
    match cfg.log_format {
        config::LogFormat::Json => {
            registry
                .with(
                    fmt::layer()
                        .json()
                        .with_target(true)
                        .with_timer(fmt::time::SystemTime)
                        .with_writer(std::io::stderr),
                )
                .init();
        }
        config::LogFormat::Pretty => {
            registry
                .with(
                    fmt::layer()
                        .pretty()
                        .with_target(true)
                        .with_writer(std::io::stderr),
                )
                .init();
        }
    }
}

fn open_sqlite(path: &Path) -> Result<SqliteRepo> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("creating database directory {}", dir.display()))?;
    }
    SqliteRepo::new(path).with_context(|| format!("opening {}", path.display()))
}

fn run<R, T, I, N>(
    svc: &CatalogService<R, T, I, N>,
    user: &CurrentUser,
    command: Command,
) -> Result<()>
where
    R: CourseRepository,
    T: TaxonomyRepository,
    I: InstructorDirectory,
    N: Notifier,
{
    match command {
        Command::Add { file } => {
            let draft: CourseDraft = read_json(&file)?;
            print_json(&svc.add_course(user, draft)?)
        }
        Command::Update(args) => {
            let id = args.id;
            let update = args.into_update();
            if update.is_empty() {
                bail!("nothing to update for course {id}");
            }
            print_json(&svc.update_course(user, id, update)?)
        }
        Command::Delete { id } => print_json(&svc.delete_course(user, id)?),
        Command::Import { file } => {
            let courses: Vec<Course> = read_json(&file)?;
            let count = svc.replace_all(user, courses)?;
            println!("imported {count} courses");
            Ok(())
        }
        Command::List { slug } => print_json(&svc.fetch_courses(slug.as_deref())?),
        Command::Show { id } => print_json(&svc.get_course(id)?),
        Command::Enroll { id } => print_json(&svc.record_enrollment(id)?),
        Command::Audit => {
            let invalid = svc.audit_catalog()?;
            if invalid.is_empty() {
                println!("all stored courses are valid");
            }
            for rec in invalid {
                println!("{}\t{}\t{}", rec.id, rec.slug, rec.reason);
            }
            Ok(())
        }
        Command::Lookup { list } => match list {
            LookupList::Categories => print_json(&svc.categories()?),
            LookupList::Universities => print_json(&svc.universities()?),
            LookupList::Countries => print_json(&svc.countries()?),
            LookupList::Instructors => print_json(&svc.instructors()?),
        },
        Command::Instructor { .. } | Command::Convert { .. } | Command::Slugify { .. } => {
            bail!("command does not run against the catalog service")
        }
    }
}

fn manage_instructors(repo: &SqliteRepo, user: &CurrentUser, action: InstructorAction) -> Result<()> {
    if !user.role.can_manage_catalog() {
        bail!(
            "unauthorized: role {} cannot manage instructors",
            user.role.as_str()
        );
    }
    match action {
        InstructorAction::Add { name } => {
            if repo.add_instructor(&name)? {
                info!(instructor = %name, "instructor added");
            } else {
                info!(instructor = %name, "instructor already present");
            }
        }
        InstructorAction::Remove { name } => {
            repo.remove_instructor(&name)?;
            info!(instructor = %name, "instructor removed");
        }
    }
    Ok(())
}

fn convert(direction: ConvertDirection) -> Result<()> {
    let out = match direction {
        ConvertDirection::ToGregorian { date } => jalali_to_gregorian(&date)
            .with_context(|| format!("'{date}' is not a valid Jalali date (YYYY/MM/DD)"))?,
        ConvertDirection::ToJalali { date } => gregorian_to_jalali(&date)
            .with_context(|| format!("'{date}' is not a valid Gregorian date (YYYY-MM-DD)"))?,
    };
    println!("{out}");
    Ok(())
}

fn read_json<D: DeserializeOwned>(path: &Path) -> Result<D> {
    let mut raw = String::new();
    if path == Path::new("-") {
        std::io::stdin()
            .read_to_string(&mut raw)
            .context("reading stdin")?;
    } else {
        raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
    }
    serde_json::from_str(&raw).with_context(|| format!("parsing {}", path.display()))
}

fn print_json<S: Serialize>(value: &S) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
