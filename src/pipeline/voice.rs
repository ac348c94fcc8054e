//! Voice collaborator for fake emergency calls.

use std::sync::Arc;

use crate::logging::structured::LogContext;

/// Places an outbound call that reads `script` to the reporting party.
pub trait VoiceGateway: Send + Sync {
    fn place_call(&self, to: &str, script: &str) -> anyhow::Result<()>;
}

/// Fire and forget: the call runs on its own thread and only its failure
/// is logged.
pub fn request_call(gateway: &Arc<dyn VoiceGateway>, to: &str, script: &str, ctx: &LogContext) {
    let gateway = Arc::clone(gateway);
    let to = to.to_string();
    let script = script.to_string();
    let ctx = ctx.clone();

    let spawned = std::thread::Builder::new()
        .name("fake-call".to_string())
        .spawn(move || {
            if let Err(e) = gateway.place_call(&to, &script) {
                log::warn!("{} FAKE_CALL_FAILED error={:#}", ctx, e);
            }
        });

    if let Err(e) = spawned {
        log::warn!("FAKE_CALL_FAILED error=spawn failed: {}", e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;
    use std::time::Duration;

    struct Recorder(parking_lot::Mutex<mpsc::Sender<(String, String)>>);

    impl VoiceGateway for Recorder {
        fn place_call(&self, to: &str, script: &str) -> anyhow::Result<()> {
            self.0.lock().send((to.to_string(), script.to_string()))?;
            Ok(())
        }
    }

    #[test]
    fn test_call_is_placed() {
        let (tx, rx) = mpsc::channel();
        let gateway: Arc<dyn VoiceGateway> = Arc::new(Recorder(parking_lot::Mutex::new(tx)));
        request_call(&gateway, "+15550100", "Mom's in the hospital", &LogContext::new("+15550100"));
        let (to, script) = rx.recv_timeout(Duration::from_secs(2)).unwrap();
        assert_eq!(to, "+15550100");
        assert!(script.contains("hospital"));
    }
}
