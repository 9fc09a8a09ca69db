extern crate clap;
extern crate rustyline;
use clap::{App, Arg};
use env_logger::Env;
use log::{error, info};
use serde::Deserialize;

use common::catalog::Catalog;
use common::database::Database;
use common::RamrError;
use queryexe::query::{
    import_table, Conductor, ConductorConfig, ExecEnv, FsStorage, MemoryStorage, Storage,
};
use rustyline::error::ReadlineError;
use rustyline::Editor;
use std::fs;
use std::fs::File;
use std::process;
use std::sync::Arc;

mod commands;
use commands::Commands;

#[derive(Deserialize, Debug, Default)]
#[serde(default)]
struct ClientConfig {
    /// Path of the json catalog.
    catalog: Option<String>,
    /// Directory of the record files for local execution.
    data_dir: Option<String>,
    conductor: ConductorConfig,
}

/// State of one interactive or scripted session.
struct Session {
    catalog: Database,
    conductor: Conductor,
    /// `None` for distributed graphs, which are only planned.
    storage: Option<Arc<dyn Storage>>,
    explain: bool,
}

impl Session {
    fn new(config: ClientConfig) -> Result<Self, RamrError> {
        let catalog = match &config.catalog {
            Some(path) => Database::from_file(path)?,
            None => Database::new("empty"),
        };
        let storage: Option<Arc<dyn Storage>> = match config.conductor.env {
            ExecEnv::Local => {
                let dir = config.data_dir.clone().unwrap_or_else(|| String::from("."));
                Some(Arc::new(FsStorage::new(dir)?))
            }
            ExecEnv::Mock => Some(Arc::new(MemoryStorage::new())),
            ExecEnv::Distributed => None,
        };
        Ok(Session {
            catalog,
            conductor: Conductor::new(config.conductor),
            storage,
            explain: false,
        })
    }

    /// Handles one command or SQL statement. Returns false to stop.
    fn process_input(&mut self, line: &str) -> Result<bool, RamrError> {
        if line.starts_with('\\') {
            let command = commands::parse_command(line).ok_or_else(|| {
                RamrError::ValidationError(format!("Unknown command {}", line))
            })?;
            return self.run_command(command);
        }
        let query = self.conductor.plan_sql(line, &self.catalog)?;
        println!("{}", query);
        if self.explain {
            println!("{}", query.graph.to_json()?);
        }
        if let Some(storage) = &self.storage {
            let result = self.conductor.run(&query, storage.clone())?;
            print!("{}", result.render());
            println!("({} rows)", result.rows.len());
            println!("{}", result.cost);
        }
        Ok(true)
    }

    fn run_command(&mut self, command: Commands) -> Result<bool, RamrError> {
        match command {
            Commands::Import { path, table } => {
                info!("Processing COMMAND::Import {:?} into {:?}", path, table);
                let storage = self.storage.as_ref().ok_or_else(|| {
                    RamrError::ExecutionError(String::from("No storage in distributed mode"))
                })?;
                let table = self
                    .catalog
                    .get_table(&table)
                    .ok_or_else(|| RamrError::UnknownRelation(table.clone()))?;
                let n = import_table(storage.as_ref(), table, File::open(&path)?)?;
                println!("Imported {} records into {}", n, table.name);
            }
            Commands::ShowTables => {
                for name in self.catalog.table_names() {
                    let schema = self.catalog.get_table_schema(&name)?;
                    println!("{}({})", name, schema.qualified_names().join(", "));
                }
            }
            Commands::Explain => {
                self.explain = !self.explain;
                println!("explain {}", if self.explain { "on" } else { "off" });
            }
            Commands::Quit => {
                info!("Received Quit Command");
                return Ok(false);
            }
        }
        Ok(true)
    }
}

fn process_cli_input(session: &mut Session) {
    let mut rl = Editor::<()>::new();
    if rl.load_history("history.txt").is_err() {
        info!("No previous history.");
    }
    let prompt: &str = "[ramr]>>";
    loop {
        let readline = rl.readline(prompt);
        match readline {
            Ok(line) => {
                let line = line.trim().trim_end_matches(';');
                if line.is_empty() {
                    continue;
                }
                rl.add_history_entry(line);
                match session.process_input(line) {
                    Ok(true) => {}
                    Ok(false) => break,
                    Err(e) => error!("{}", e),
                }
            }
            Err(ReadlineError::Interrupted) => {
                info!("CTRL-C");
                break;
            }
            Err(ReadlineError::Eof) => {
                info!("CTRL-D");
                break;
            }
            Err(err) => {
                error!("Error: {:?}", err);
                break;
            }
        }
    }
    if let Err(e) = rl.save_history("history.txt") {
        error!("Could not save history: {:?}", e);
    }
}

/// Runs each `;` separated statement of the script, stopping at the first
/// error.
fn process_script_input(session: &mut Session, script: &str) -> Result<(), RamrError> {
    for line in script.split(';') {
        let command = line.trim();
        if command.is_empty() {
            continue;
        }
        let clean_command = &command.replace("\n", " ");
        info!("Script clean command: {}", clean_command);
        if !session.process_input(clean_command)? {
            break;
        }
    }
    Ok(())
}

fn load_config(path: &str) -> Result<ClientConfig, RamrError> {
    let contents = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&contents)?)
}

fn main() {
    // Configure log environment
    env_logger::from_env(Env::default().default_filter_or("info")).init();

    let matches = App::new(env!("CARGO_PKG_NAME"))
        .version(env!("CARGO_PKG_VERSION"))
        .author(env!("CARGO_PKG_AUTHORS"))
        .about(env!("CARGO_PKG_DESCRIPTION"))
        .arg(
            Arg::with_name("config")
                .short("c")
                .long("config")
                .value_name("FILE")
                .help("Sets a custom json config file")
                .takes_value(true)
                .required(false),
        )
        .arg(
            Arg::with_name("catalog")
                .short("d")
                .long("catalog")
                .value_name("FILE")
                .help("Json catalog of the relations")
                .takes_value(true),
        )
        .arg(
            Arg::with_name("env")
                .short("e")
                .long("env")
                .value_name("ENV")
                .possible_values(&["local", "mock", "distributed", "hdfs"])
                .help("Execution environment")
                .takes_value(true),
        )
        .arg(
            Arg::with_name("data-dir")
                .long("data-dir")
                .value_name("DIR")
                .help("Directory of the record files for local execution")
                .takes_value(true),
        )
        .arg(
            Arg::with_name("no-optimize")
                .long("no-optimize")
                .help("Compiles the query without rewriting it"),
        )
        .arg(
            Arg::with_name("no-fold")
                .long("no-fold")
                .help("Keeps one task per operator"),
        )
        .arg(
            Arg::with_name("explain")
                .long("explain")
                .help("Prints task graphs as json"),
        )
        .arg(
            Arg::with_name("script")
                .short("s")
                .long("script")
                .value_name("RAMR_SCRIPT")
                .help("Takes in a semicolon delimited file of commands and SQL queries.")
                .takes_value(true)
                .required(false),
        )
        .get_matches();

    let mut config = match matches.value_of("config") {
        Some(path) => match load_config(path) {
            Ok(config) => config,
            Err(e) => {
                error!("Could not load config {}: {}", path, e);
                process::exit(1);
            }
        },
        None => ClientConfig::default(),
    };
    // Command line flags override the config file.
    if let Some(catalog) = matches.value_of("catalog") {
        config.catalog = Some(catalog.to_string());
    }
    if let Some(dir) = matches.value_of("data-dir") {
        config.data_dir = Some(dir.to_string());
    }
    if let Some(env) = matches.value_of("env") {
        match env.parse::<ExecEnv>() {
            Ok(env) => config.conductor.env = env,
            Err(e) => {
                error!("{}", e);
                process::exit(1);
            }
        }
    }
    if matches.is_present("no-optimize") {
        config.conductor.optimize = false;
    }
    if matches.is_present("no-fold") {
        config.conductor.fold = false;
    }

    info!("Starting client with config: {:?}", config);

    let mut session = match Session::new(config) {
        Ok(session) => session,
        Err(e) => {
            error!("Failed to start: {}", e);
            process::exit(1);
        }
    };
    session.explain = matches.is_present("explain");

    match matches.value_of("script") {
        Some(path) => {
            let result = fs::read_to_string(path)
                .map_err(RamrError::from)
                .and_then(|script| process_script_input(&mut session, &script));
            if let Err(e) = result {
                error!("Bad Script: {}", e);
                process::exit(1);
            }
        }
        None => process_cli_input(&mut session),
    }
    info!("Terminated.");
}

#[cfg(test)]
mod test {
    use super::*;
    use common::testutil::*;
    use queryexe::query::write_table;

    fn mock_session() -> Session {
        let mut session = Session::new(ClientConfig {
            conductor: ConductorConfig {
                env: ExecEnv::Mock,
                ..ConductorConfig::default()
            },
            ..ClientConfig::default()
        })
        .unwrap();
        session.catalog = int_db(&[("R", &["a", "b"])]);
        session
    }

    #[test]
    fn test_script_session() {
        init();
        let mut session = mock_session();
        let storage = session.storage.clone().unwrap();
        let rows = create_tuple_list(vec![vec![1, 2], vec![3, 4]]);
        write_table(storage.as_ref(), session.catalog.get_table("R").unwrap(), &rows).unwrap();
        let script = "\\dt;\nSELECT b\n  FROM R WHERE a = 3;\n\\explain; \\quit; SELECT * FROM Nope";
        assert_eq!(Ok(()), process_script_input(&mut session, script));
        assert!(session.explain);
        assert!(storage.exists("tmp1.tmp"));
    }

    #[test]
    fn test_script_stops_at_error() {
        let mut session = mock_session();
        assert_eq!(
            Err(RamrError::UnknownRelation(String::from("Nope"))),
            process_script_input(&mut session, "SELECT * FROM Nope; \\quit")
        );
        // R holds no records yet.
        assert!(process_script_input(&mut session, "SELECT * FROM R WHERE a = 1").is_err());
        assert!(session.process_input("\\bogus").is_err());
    }

    #[test]
    fn test_config_json() {
        let config: ClientConfig = serde_json::from_str(
            r#"{"catalog": "pizza.json", "conductor": {"env": "mock", "fold": false}}"#,
        )
        .unwrap();
        assert_eq!(Some(String::from("pizza.json")), config.catalog);
        assert!(!config.conductor.fold);
        let config: ClientConfig =
            serde_json::from_str(r#"{"conductor": {"env": "distributed"}}"#).unwrap();
        assert_eq!(ExecEnv::Distributed, config.conductor.env);
        assert!(config.conductor.optimize);
        assert!(Session::new(config).unwrap().storage.is_none());
    }
}
