use anyhow::Result;
use futures_util::StreamExt as _;
use serde_json::json;
use startos_client_core::patch::DbPath;

use crate::{application, interrupt::InterruptState, options::Options};

/// Print the value at each path now and after every change, as JSON lines of
/// the form `{"path": ..., "value": ...}`.
pub async fn watch(interrupt_state: &InterruptState, options: &Options, paths: &[String]) -> Result<()> {
    let paths: Vec<DbPath> = paths.iter().map(|p| DbPath::parse_dotted(p)).collect();
    application::with_client(interrupt_state, options, |client| async move {
        let watches = paths.iter().map(|path| {
            let label = path.to_string();
            client
                .store()
                .watch(path)
                .map(move |value| Ok::<_, std::convert::Infallible>(json!({ "path": label, "value": value })))
        });
        let merged = futures_util::stream::select_all(watches);
        application::print_until_interrupted(interrupt_state, merged).await
    })
    .await
}
