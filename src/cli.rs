// Copyright 2025 Fernando Borretti
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use clap::Parser;

use crate::cmd::import::import_items;
use crate::cmd::serve::server::ServeConfig;
use crate::cmd::serve::server::start_server;
use crate::cmd::stats::StatsFormat;
use crate::cmd::stats::print_stats;
use crate::config;
use crate::error::Fallible;

#[derive(Parser)]
#[command(version, about, long_about = None)]
enum Command {
    /// Serve the study API over HTTP.
    Serve {
        /// Path to the SQLite database. By default, ./smartlearn.sqlite3 is used.
        db: Option<String>,
        /// Path to the config file. By default, ./smartlearn.toml is used if present.
        #[arg(long)]
        config: Option<String>,
        /// The host address to bind to. Overrides the config file.
        #[arg(long)]
        host: Option<String>,
        /// The port to use for the web server. Overrides the config file.
        #[arg(long)]
        port: Option<u16>,
    },
    /// Print library progress statistics.
    Stats {
        /// Path to the SQLite database. By default, ./smartlearn.sqlite3 is used.
        db: Option<String>,
        /// Only report on this library. By default, all libraries are reported.
        #[arg(long)]
        library: Option<String>,
        /// Which output format to use.
        #[arg(long, default_value_t = StatsFormat::Text)]
        format: StatsFormat,
    },
    /// Import library items from a JSON file.
    Import {
        /// Path to the JSON file of items to import.
        file: String,
        /// Path to the SQLite database. By default, ./smartlearn.sqlite3 is used.
        #[arg(long)]
        db: Option<String>,
    },
}

pub async fn entrypoint() -> Fallible<()> {
    let cli: Command = Command::parse();
    match cli {
        Command::Serve {
            db,
            config,
            host,
            port,
        } => {
            let config = config::load(config.as_deref())?;
            let serve_config = ServeConfig {
                db_path: db,
                host: host.unwrap_or(config.server.host),
                port: port.unwrap_or(config.server.port),
                cache_ttl_secs: config.cache.default_ttl_secs,
                tuning: config.scheduler,
            };
            start_server(serve_config).await
        }
        Command::Stats {
            db,
            library,
            format,
        } => print_stats(db, library, format).await,
        Command::Import { file, db } => import_items(file, db).await,
    }
}
