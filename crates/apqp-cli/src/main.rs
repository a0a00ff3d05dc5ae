mod args;

use std::process::exit;

use apqp_core::{ApprovalEngine, ApprovalStore, DecisionCommand, NotificationSink, Submission, TrackedFile};
use apqp_persistence::{build_pool, PgApprovalStore};
use apqp_tracking::config;
use apqp_tracking::notifications::Notifier;
use apqp_tracking::service::{exit_code, respond, ResponseClass};
use args::Command;
use log::debug;
use serde::Serialize;

fn main() {
    // .env antes del logger para que RUST_LOG también pueda venir de ahí
    let dotenv = dotenvy::dotenv();
    env_logger::init();
    if let Err(e) = dotenv {
        debug!(".env no cargado: {e}");
    }
    let argv: Vec<String> = std::env::args().skip(1).collect();
    let cmd = match args::parse(&argv) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("[apqp] {e}");
            eprintln!("{}", args::USAGE);
            exit(2);
        }
    };

    let cfg = match config() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("[apqp] {e}");
            exit(5);
        }
    };
    let db = match cfg.database() {
        Ok(db) => db,
        Err(_) => {
            eprintln!("[apqp] requiere DATABASE_URL para operar contra el backend persistente");
            exit(5);
        }
    };
    let pool = match build_pool(&db.url, db.min_connections, db.max_connections) {
        Ok(p) => p,
        Err(e) => {
            eprintln!("[apqp] pool error: {e}");
            exit(5);
        }
    };
    let rt = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("[apqp] runtime error: {e}");
            exit(5);
        }
    };

    let notifier = Notifier::start(cfg.notifications, &rt);
    let engine = ApprovalEngine::new(PgApprovalStore::from_pool(pool), notifier.sink.clone());
    let code = run(&engine, cmd);
    // el engine suelta su sink antes de esperar a la cola
    drop(engine);
    notifier.finish(&rt);
    exit(code);
}

fn run<S, N>(engine: &ApprovalEngine<S, N>, cmd: Command) -> i32
    where S: ApprovalStore,
          N: NotificationSink
{
    match cmd {
        Command::Submit { item,
                          by,
                          file_name,
                          file_path, } => emit(engine.submit(&Submission::new(item, by, TrackedFile::new(file_name, file_path)))),
        Command::Decide { item,
                          status,
                          by,
                          note, } => {
            let mut cmd = DecisionCommand::new(item, status, by);
            if let Some(note) = note {
                cmd = cmd.with_note(note);
            }
            emit(engine.decide(&cmd))
        }
        Command::Status { item } => emit(engine.snapshot(item)),
        Command::Pending { approver } => match engine.pending_for(approver) {
            Ok(list) => print_json(&list).map_or(5, |_| 0),
            Err(e) => {
                eprintln!("[apqp pending] error: {e}");
                5
            }
        },
    }
}

fn emit<T: Serialize>(res: Result<apqp_core::Outcome<T>, apqp_core::ApprovalError>) -> i32 {
    let code = exit_code(&res);
    let resp = respond(res);
    if resp.class == ResponseClass::Success {
        if print_json(&resp.body).is_err() {
            return 5;
        }
    } else {
        eprintln!("[apqp] {} {}", resp.status, resp.body);
    }
    code
}

fn print_json<T: Serialize>(value: &T) -> Result<(), ()> {
    match serde_json::to_string_pretty(value) {
        Ok(s) => {
            println!("{s}");
            Ok(())
        }
        Err(e) => {
            eprintln!("[apqp] json error: {e}");
            Err(())
        }
    }
}
