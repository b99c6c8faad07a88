use std::sync::Arc;

use tracing::{error, info};

use tasklane::app::App;
use tasklane::config::{BackendMode, Config};
use tasklane::memory::MemoryBackend;
use tasklane::service::TaskService;
use tasklane::session::{Authenticator, SessionHandle};
use tasklane::store::TaskStore;
use tasklane::supabase::SupabaseClient;
use tasklane::{logging, ui, Error};

fn backends(config: &Config) -> Result<(Arc<dyn TaskStore>, Arc<dyn Authenticator>), Error> {
    match config.backend {
        BackendMode::Memory => {
            let backend = MemoryBackend::new();
            Ok((Arc::new(backend.clone()), Arc::new(backend)))
        }
        BackendMode::Supabase => {
            let (Some(url), Some(key)) = (&config.supabase_url, &config.supabase_anon_key) else {
                return Err(Error::Config("Supabase URL and anon key are required".into()));
            };
            let client = SupabaseClient::new(url, key);
            Ok((Arc::new(client.clone()), Arc::new(client)))
        }
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    let config = Config::from_env()?;
    logging::init(&config.log_file)?;
    info!(backend = ?config.backend, "starting");

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    let (store, auth) = backends(&config)?;
    let service = TaskService::new(store, SessionHandle::new());
    let mut app = App::new(service, auth, runtime.handle().clone());

    let mut terminal =
        ui::setup_terminal().inspect_err(|err| error!(%err, "terminal setup failed"))?;
    let result = ui::run_app(&mut terminal, &mut app);
    if let Err(err) = &result {
        error!(%err, "ui loop failed");
    }

    // UI error wins over a restore error
    result.and(ui::restore_terminal(&mut terminal))?;
    info!("exiting");
    Ok(())
}
