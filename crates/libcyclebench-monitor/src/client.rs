//! Monitor client driving every configured agent

use std::time::Duration;

use tracing::{info, warn};

use crate::error::MonitorError;
use crate::target::MonitorTarget;
use crate::xmlrpc::XmlRpcMonitor;
use crate::MonitorRpc;

/// Samples fetched from one agent at the end of a cycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonitorPayload {
    pub target: MonitorTarget,
    pub key: String,
    pub xml: String,
}

struct ActiveMonitor {
    target: MonitorTarget,
    rpc: Box<dyn MonitorRpc>,
}

/// Client for the set of monitoring agents of a run.
///
/// The active set only shrinks: an agent that fails to start or stop is
/// dropped and never called again for the rest of the run.
pub struct MonitorClient {
    active: Vec<ActiveMonitor>,
}

impl MonitorClient {
    /// Connect to every target over XML-RPC
    pub fn connect(targets: Vec<MonitorTarget>, timeout: Duration) -> Self {
        Self::with_transport(targets, |target| {
            Box::new(XmlRpcMonitor::new(target, timeout)) as Box<dyn MonitorRpc>
        })
    }

    /// Build a client with a custom transport per target
    pub fn with_transport<F>(targets: Vec<MonitorTarget>, mut connector: F) -> Self
    where
        F: FnMut(&MonitorTarget) -> Box<dyn MonitorRpc>,
    {
        let active = targets
            .into_iter()
            .map(|target| {
                let rpc = connector(&target);
                ActiveMonitor { target, rpc }
            })
            .collect();
        Self { active }
    }

    /// A client with no agents
    pub fn disabled() -> Self {
        Self { active: Vec::new() }
    }

    /// Targets still in the active set
    pub fn targets(&self) -> impl Iterator<Item = &MonitorTarget> {
        self.active.iter().map(|m| &m.target)
    }

    pub fn is_empty(&self) -> bool {
        self.active.is_empty()
    }

    pub fn len(&self) -> usize {
        self.active.len()
    }

    /// Ask every active agent to start recording under `key`.
    ///
    /// Agents that fail are dropped. Returns the number of agents recording.
    pub fn start(&mut self, key: &str) -> usize {
        self.active.retain(|monitor| match monitor.rpc.start_record(key) {
            Ok(()) => {
                info!(monitor = %monitor.target, key, "Monitoring started");
                true
            }
            Err(e) => {
                log_dropped(&monitor.target, "start", &e);
                false
            }
        });
        self.active.len()
    }

    /// Stop recording under `key` and fetch each agent's samples.
    ///
    /// Failures are logged and drop the agent; they never abort the run.
    pub fn stop(&mut self, key: &str) -> Vec<MonitorPayload> {
        let mut payloads = Vec::with_capacity(self.active.len());

        self.active.retain(|monitor| {
            let fetched = monitor
                .rpc
                .stop_record(key)
                .and_then(|_| monitor.rpc.get_xml_result(key));

            match fetched {
                Ok(xml) => {
                    info!(monitor = %monitor.target, key, bytes = xml.len(), "Monitoring stopped");
                    payloads.push(MonitorPayload {
                        target: monitor.target.clone(),
                        key: key.to_string(),
                        xml,
                    });
                    true
                }
                Err(e) => {
                    log_dropped(&monitor.target, "stop", &e);
                    false
                }
            }
        });

        payloads
    }
}

fn log_dropped(target: &MonitorTarget, phase: &str, error: &MonitorError) {
    if error.is_unreachable() {
        warn!(monitor = %target, phase, "Monitor unreachable, dropping it: {}", error);
    } else {
        warn!(monitor = %target, phase, "Monitor call failed, dropping it: {}", error);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Copy)]
    enum Behavior {
        Healthy,
        Down,
        FailsOnStop,
    }

    struct FakeMonitor {
        name: String,
        behavior: Behavior,
        calls: Arc<Mutex<Vec<String>>>,
    }

    impl FakeMonitor {
        fn record(&self, method: &str, key: &str) {
            self.calls
                .lock()
                .unwrap()
                .push(format!("{}:{}:{}", self.name, method, key));
        }
    }

    impl MonitorRpc for FakeMonitor {
        fn start_record(&self, key: &str) -> Result<(), MonitorError> {
            self.record("start", key);
            match self.behavior {
                Behavior::Down => Err(MonitorError::ConnectionFailed("refused".into())),
                _ => Ok(()),
            }
        }

        fn stop_record(&self, key: &str) -> Result<(), MonitorError> {
            self.record("stop", key);
            match self.behavior {
                Behavior::FailsOnStop => Err(MonitorError::Timeout(10)),
                _ => Ok(()),
            }
        }

        fn get_xml_result(&self, key: &str) -> Result<String, MonitorError> {
            self.record("fetch", key);
            Ok(format!("<monitor host=\"{}\" key=\"{}\"/>", self.name, key))
        }
    }

    fn client(
        agents: &[(&str, Behavior)],
        calls: &Arc<Mutex<Vec<String>>>,
    ) -> MonitorClient {
        let targets = agents
            .iter()
            .map(|(name, _)| MonitorTarget::new(*name, 8008, format!("{} box", name)))
            .collect();
        let behaviors: Vec<Behavior> = agents.iter().map(|(_, b)| *b).collect();
        let mut next = 0;
        MonitorClient::with_transport(targets, |target| {
            let behavior = behaviors[next];
            next += 1;
            Box::new(FakeMonitor {
                name: target.host.clone(),
                behavior,
                calls: Arc::clone(calls),
            }) as Box<dyn MonitorRpc>
        })
    }

    #[test]
    fn test_unreachable_target_dropped_at_start() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let mut client = client(&[("web", Behavior::Healthy), ("db", Behavior::Down)], &calls);

        assert_eq!(client.start("t:0:1"), 1);
        let payloads = client.stop("t:0:1");
        assert_eq!(payloads.len(), 1);
        assert_eq!(payloads[0].target.host, "web");
        assert_eq!(payloads[0].xml, "<monitor host=\"web\" key=\"t:0:1\"/>");

        client.start("t:1:2");
        let calls = calls.lock().unwrap();
        assert!(!calls.iter().any(|c| c.starts_with("db:stop")));
        assert!(!calls.iter().any(|c| c.starts_with("db:fetch")));
        assert!(!calls.contains(&"db:start:t:1:2".to_string()));
    }

    #[test]
    fn test_stop_failure_is_not_fatal() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let mut client = client(
            &[("web", Behavior::FailsOnStop), ("db", Behavior::Healthy)],
            &calls,
        );

        assert_eq!(client.start("t:0:1"), 2);
        let payloads = client.stop("t:0:1");
        assert_eq!(payloads.len(), 1);
        assert_eq!(payloads[0].target.host, "db");
        assert_eq!(client.targets().map(|t| t.host.as_str()).collect::<Vec<_>>(), vec!["db"]);
    }

    #[test]
    fn test_disabled_client_is_noop() {
        let mut client = MonitorClient::disabled();
        assert!(client.is_empty());
        assert_eq!(client.start("t:0:1"), 0);
        assert!(client.stop("t:0:1").is_empty());
    }
}
