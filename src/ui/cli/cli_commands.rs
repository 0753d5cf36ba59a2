use clap::{Parser, Subcommand, ValueEnum};
use log::info;

use crate::connections::connection::{DbConnection, SqlDriver};
use crate::connections::errors::ConnectionError;
use crate::connections::redis::RedisConnectionMgr;
use crate::connections::sql::{MySqlDriver, PostgresDriver, SqlConnectionManager, SqlValue};
use crate::connections::ssh::SshClientManager;
use crate::core::params::Params;
use crate::core::registry::Registry;
use crate::http::{CallOptions, HttpClient, HttpConfig, Method, Reply, RequestOptions};

/// Command-line arguments.
#[derive(Parser, Debug)]
#[command(name = "qakit", version, about = "Smoke-check the connections a test suite relies on")]
pub struct Args {
    #[command(subcommand)]
    pub backend: Backend,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum SqlBackend {
    Mysql,
    Postgres,
}

#[derive(Subcommand, Debug)]
pub enum RedisAction {
    /// PING the server
    Ping,
    /// Print the value stored at KEY
    Get { key: String },
    /// Store VALUE at KEY
    Set { key: String, value: String },
}

#[derive(Subcommand, Debug)]
pub enum Backend {
    /// Run one statement against a relational database
    Sql {
        #[arg(long, value_enum, default_value_t = SqlBackend::Mysql)]
        backend: SqlBackend,
        /// Connection parameter as key=value (host, port, user, password, database)
        #[arg(short, long = "param")]
        params: Vec<String>,
        /// Statement to execute
        #[arg(long)]
        statement: String,
        /// Positional parameter bound to the statement
        #[arg(long = "bind")]
        binds: Vec<String>,
    },
    /// Run a command over SSH
    Ssh {
        /// Connection parameter as key=value (host, port, username, password, key_filename)
        #[arg(short, long = "param")]
        params: Vec<String>,
        #[arg(long, default_value = "uname -a")]
        command: String,
    },
    /// Talk to a Redis server
    Redis {
        /// Connection parameter as key=value (host, port, db, password, url)
        #[arg(short, long = "param")]
        params: Vec<String>,
        #[command(subcommand)]
        action: RedisAction,
    },
    /// Issue one HTTP request through the request wrapper
    Http {
        #[arg(long)]
        base_url: String,
        #[arg(long, default_value = "")]
        path: String,
        #[arg(long, default_value = "GET")]
        method: String,
        /// Header as name=value
        #[arg(long = "header")]
        headers: Vec<String>,
        /// Don't expect a JSON body
        #[arg(long)]
        raw: bool,
    },
}

pub fn run_cli(args: Args) -> Result<(), ConnectionError> {
    let registry = Registry::new();

    match args.backend {
        Backend::Sql {
            backend,
            params,
            statement,
            binds,
        } => {
            let params = Params::from_pairs(&params)?;
            let binds: Vec<SqlValue> = binds.into_iter().map(SqlValue::from).collect();
            match backend {
                SqlBackend::Mysql => run_sql::<MySqlDriver>(&registry, params, &statement, &binds),
                SqlBackend::Postgres => run_sql::<PostgresDriver>(&registry, params, &statement, &binds),
            }
        }
        Backend::Ssh { params, command } => {
            let manager = registry.get_or_create::<SshClientManager>(Params::from_pairs(&params)?)?;
            let mut manager = lock(&manager)?;
            let output = manager.client()?.exec(&command)?;
            print!("{}", output.stdout);
            eprint!("{}", output.stderr);
            info!("'{}' exited with {}", command, output.exit_status);
            manager.forced_close()
        }
        Backend::Redis { params, action } => {
            let manager = registry.get_or_create::<RedisConnectionMgr>(Params::from_pairs(&params)?)?;
            let mut manager = lock(&manager)?;
            let client = manager.client()?;
            match action {
                RedisAction::Ping => println!("{}", client.ping()?),
                RedisAction::Get { key } => match client.get(&key)? {
                    Some(value) => println!("{}", value),
                    None => println!("(nil)"),
                },
                RedisAction::Set { key, value } => {
                    client.set(&key, &value)?;
                    println!("OK");
                }
            }
            manager.forced_close()
        }
        Backend::Http {
            base_url,
            path,
            method,
            headers,
            raw,
        } => run_http(base_url, &path, &method, &headers, raw),
    }
}

fn lock<M>(manager: &std::sync::Mutex<M>) -> Result<std::sync::MutexGuard<'_, M>, ConnectionError> {
    manager
        .lock()
        .map_err(|_| ConnectionError::Other("manager lock poisoned".into()))
}

fn run_sql<D: SqlDriver>(
    registry: &Registry,
    params: Params,
    statement: &str,
    binds: &[SqlValue],
) -> Result<(), ConnectionError> {
    let manager = registry.get_or_create::<SqlConnectionManager<D>>(params)?;
    let mut manager = lock(&manager)?;
    let connection = manager.connection()?;
    let rows = connection.with_cursor(|cursor| {
        let affected = cursor.execute(statement, binds)?;
        info!("{} row(s)", affected);
        Ok(cursor.fetch_all())
    })?;
    for row in rows {
        let cells: Vec<String> = row.iter().map(ToString::to_string).collect();
        println!("{}", cells.join("\t"));
    }
    // The shared-connection guard: this only logs a warning.
    connection.close()?;
    manager.forced_close()
}

fn run_http(base_url: String, path: &str, method: &str, headers: &[String], raw: bool) -> Result<(), ConnectionError> {
    let method = Method::from_bytes(method.to_ascii_uppercase().as_bytes())
        .map_err(|e| ConnectionError::Usage(format!("invalid method: {}", e)))?;
    let mut options = RequestOptions::new();
    for header in headers {
        let (name, value) = header
            .split_once('=')
            .ok_or_else(|| ConnectionError::Usage(format!("expected name=value, got '{}'", header)))?;
        options = options.header(name, value);
    }

    let mut client = HttpClient::new(base_url, HttpConfig::from_env());
    let call = if raw { CallOptions::raw() } else { CallOptions::default() };
    let reply = client
        .call_api(path, method, Some(&options), call)
        .map_err(|e| ConnectionError::Other(e.to_string()))?;
    match reply {
        Reply::Response { json: Some(json), .. } => {
            println!("{}", serde_json::to_string_pretty(&json).unwrap_or_else(|_| json.to_string()))
        }
        Reply::Response { response, json: None } => println!("{}", response.text()),
        Reply::Intercepted(value) => println!("{}", value),
    }
    Ok(())
}
