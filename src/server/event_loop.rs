//! Event arbitration loop
//!
//! The only owner of the [`StreamRegistry`]. One task runs the loop and
//! waits on, in priority order:
//!
//! 1. the root shutdown signal (the loop exits),
//! 2. the pulse tick (timeout sweep),
//! 3. the termination multiplexer (one case per live publisher/subscriber),
//! 4. the request queue.
//!
//! Every registry mutation happens in one of these handlers, so mutations are
//! totally ordered without locks.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::time::{Instant, MissedTickBehavior};

use crate::error::Error;
use crate::registry::StreamRegistry;
use crate::session::Lifecycle;

use super::config::ServerConfig;
use super::plugin::{Event, Plugin};
use super::request::Request;
use super::terminations::{Terminated, Terminations};

/// Wait cases that exist regardless of live entities: shutdown, pulse, queue
pub const BASE_CASES: usize = 3;

/// State of one run cycle of the loop
pub struct EventLoop<'a> {
    config: &'a ServerConfig,
    plugins: &'a [Arc<dyn Plugin>],
    registry: StreamRegistry,
    terminations: Terminations,
}

impl<'a> EventLoop<'a> {
    /// Create a loop with an empty registry
    pub fn new(config: &'a ServerConfig, plugins: &'a [Arc<dyn Plugin>]) -> Self {
        Self {
            config,
            plugins,
            registry: StreamRegistry::new(),
            terminations: Terminations::new(),
        }
    }

    /// Run until `root` is stopped or the queue closes
    pub async fn run(&mut self, root: &Lifecycle, rx: &mut mpsc::Receiver<Request>) {
        let period = self.config.pulse_interval;
        let mut pulse = tokio::time::interval_at(Instant::now() + period, period);
        pulse.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = root.stopped() => break,
                _ = pulse.tick() => {
                    self.on_pulse(Instant::now());
                }
                Some(terminated) = self.terminations.next(), if !self.terminations.is_empty() => {
                    self.on_terminated(terminated, Instant::now());
                }
                request = rx.recv() => match request {
                    Some(request) => self.handle_request(request),
                    None => break,
                },
            }
        }
    }

    /// Timeout sweep
    pub fn on_pulse(&mut self, now: Instant) {
        let stopped = self.registry.sweep(now);
        if stopped > 0 {
            tracing::debug!(stopped, "Pulse stopped timed out entities");
        }
    }

    /// Unpublish or unsubscribe an entity whose stop signal fired
    pub fn on_terminated(&mut self, terminated: Terminated, now: Instant) {
        match terminated {
            Terminated::Publisher(id) => {
                self.registry.remove_publisher(id, now);
            }
            Terminated::Subscriber(id) => {
                self.registry.remove_subscriber(id);
            }
        }
        tracing::debug!(
            cases = self.wait_set_len(),
            publishers = self.terminations.publisher_count(),
            subscribers = self.terminations.subscriber_count(),
            "Wait-set shrunk"
        );
    }

    /// Apply one request and complete its promise
    pub fn handle_request(&mut self, request: Request) {
        let now = Instant::now();
        tracing::trace!(
            kind = request.kind(),
            abandoned = request.is_abandoned(),
            "Handling request"
        );

        let event = match request {
            Request::Publish(promise) => {
                if let Err(err) = self.registry.on_publish(promise.value(), now) {
                    tracing::debug!(stream = %promise.value().stream_path(), error = %err, "Publish rejected");
                    promise.reject(err);
                    return;
                }
                let publisher = promise.resolve(());
                self.terminations.add_publisher(&publisher);
                Event::Publish(publisher)
            }
            Request::Subscribe(promise) => {
                if let Err(err) = self.registry.on_subscribe(promise.value(), now) {
                    promise.reject(err);
                    return;
                }
                let subscriber = promise.resolve(());
                self.terminations.add_subscriber(&subscriber);
                if !self.config.enable_sub_event {
                    return;
                }
                Event::Subscribe(subscriber)
            }
            Request::Pull(promise) => {
                if let Err(err) = self.registry.on_pull(promise.value(), now) {
                    tracing::debug!(stream = %promise.value().stream_path(), error = %err, "Pull rejected");
                    promise.reject(err);
                    return;
                }
                let puller = promise.resolve(());
                self.terminations.add_publisher(puller.publisher());
                Event::Pull(puller)
            }
            Request::Snapshot(promise) => {
                let publisher = self.registry.publisher(promise.value()).cloned();
                promise.resolve(publisher);
                return;
            }
            Request::Describe(promise) => {
                let snapshot = self.registry.snapshot(promise.value());
                promise.resolve(snapshot);
                return;
            }
            Request::ListStreams(promise) => {
                promise.resolve(self.registry.snapshots());
                return;
            }
            Request::StopSubscriber(promise) => {
                let id = *promise.value();
                match self.registry.find_subscriber(id) {
                    Some(subscriber) => {
                        subscriber.stop(Error::StoppedByRequest);
                        promise.resolve(());
                    }
                    None => {
                        promise.reject(Error::NotFound(id));
                    }
                }
                return;
            }
        };

        self.dispatch(&event);
    }

    /// Hand an accepted event to every enabled plugin, in registration order
    fn dispatch(&self, event: &Event) {
        for plugin in self.plugins {
            if plugin.disabled() {
                continue;
            }
            tracing::trace!(plugin = plugin.name(), event = event.kind(), "Dispatching event");
            plugin.on_event(event);
        }
    }

    /// Stop every live publisher, then every live subscriber
    pub fn stop_entities(&self, reason: &Error) {
        for publisher in self.registry.live_publishers() {
            publisher.stop(reason.clone());
            publisher.close();
        }
        for subscriber in self.registry.live_subscribers() {
            subscriber.stop(reason.clone());
            subscriber.close();
        }
    }

    /// Current wait-set size
    pub fn wait_set_len(&self) -> usize {
        BASE_CASES + self.terminations.len()
    }

    pub fn registry(&self) -> &StreamRegistry {
        &self.registry
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::promise::Promise;
    use crate::registry::StreamPath;
    use crate::server::config::{PublishConfig, SubscribeConfig};
    use crate::server::plugin::testing::Recorder;
    use crate::session::{Publisher, Puller, Subscriber};

    fn plugins(recorders: &[Arc<Recorder>]) -> Vec<Arc<dyn Plugin>> {
        recorders
            .iter()
            .map(|r| Arc::clone(r) as Arc<dyn Plugin>)
            .collect()
    }

    fn publish(lp: &mut EventLoop<'_>, publisher: &Arc<Publisher>) -> crate::error::Result<()> {
        let (promise, mut done) = Promise::new(Arc::clone(publisher));
        lp.handle_request(Request::Publish(promise));
        done_now(&mut done)
    }

    fn subscribe(lp: &mut EventLoop<'_>, subscriber: &Arc<Subscriber>) -> crate::error::Result<()> {
        let (promise, mut done) = Promise::new(Arc::clone(subscriber));
        lp.handle_request(Request::Subscribe(promise));
        done_now(&mut done)
    }

    /// Read an already-completed promise.
    fn done_now<R>(done: &mut crate::promise::Completion<R>) -> crate::error::Result<R> {
        let mut task = tokio_test::task::spawn(done);
        match task.poll() {
            std::task::Poll::Ready(result) => result,
            std::task::Poll::Pending => panic!("promise not completed"),
        }
    }

    #[tokio::test]
    async fn test_publish_dispatches_in_registration_order() {
        let config = ServerConfig::default();
        let journal = Recorder::journal();
        let first = Recorder::with_journal("first", &journal);
        let disabled = Recorder::new_disabled("disabled");
        let second = Recorder::with_journal("second", &journal);
        let plugins = plugins(&[first.clone(), disabled.clone(), second.clone()]);
        let mut lp = EventLoop::new(&config, &plugins);

        let cam = Publisher::new("test", "cam1", PublishConfig::default());
        publish(&mut lp, &cam).unwrap();

        assert_eq!(first.events(), vec!["publish:cam1".to_string()]);
        assert_eq!(second.events(), vec!["publish:cam1".to_string()]);
        assert!(disabled.events().is_empty());
        assert_eq!(
            *journal.lock(),
            vec!["first:publish:cam1".to_string(), "second:publish:cam1".to_string()]
        );
        assert_eq!(lp.wait_set_len(), BASE_CASES + 1);
    }

    #[tokio::test]
    async fn test_rejected_publish_is_not_dispatched() {
        let config = ServerConfig::default();
        let recorder = Recorder::new("recorder");
        let plugins = plugins(&[recorder.clone()]);
        let mut lp = EventLoop::new(&config, &plugins);

        publish(&mut lp, &Publisher::new("test", "cam1", PublishConfig::default())).unwrap();
        let result = publish(&mut lp, &Publisher::new("test", "cam1", PublishConfig::default()));

        assert_eq!(result, Err(Error::StreamExists("cam1".into())));
        assert_eq!(recorder.events().len(), 1);
        assert_eq!(lp.wait_set_len(), BASE_CASES + 1);
    }

    #[tokio::test]
    async fn test_subscribe_event_gated_by_config() {
        let config = ServerConfig::default().enable_sub_event(false);
        let recorder = Recorder::new("recorder");
        let plugins = plugins(&[recorder.clone()]);
        let mut lp = EventLoop::new(&config, &plugins);

        let sub = Subscriber::new("test", "cam1", SubscribeConfig::default());
        subscribe(&mut lp, &sub).unwrap();

        assert!(recorder.events().is_empty());
        assert_eq!(lp.registry().waiting(&"cam1".into()), vec![sub.id()]);
        assert_eq!(lp.wait_set_len(), BASE_CASES + 1);
    }

    #[tokio::test]
    async fn test_pull_collision_fails_before_publish() {
        let config = ServerConfig::default();
        let recorder = Recorder::new("recorder");
        let plugins = plugins(&[recorder.clone()]);
        let mut lp = EventLoop::new(&config, &plugins);

        let url = "rtmp://upstream/live/cam1";
        let (promise, mut done) = Promise::new(Puller::new("relay", "cam1", url, PublishConfig::default()));
        lp.handle_request(Request::Pull(promise));
        assert_eq!(done_now(&mut done), Ok(()));

        let kicker = Puller::new("relay", "cam1", url, PublishConfig::default().kick_exist(true));
        let (promise, mut done) = Promise::new(Arc::clone(&kicker));
        lp.handle_request(Request::Pull(promise));

        assert_eq!(done_now(&mut done), Err(Error::StreamExists("cam1".into())));
        assert_eq!(kicker.publisher().id(), 0);
        assert_eq!(recorder.events(), vec!["pull:cam1".to_string()]);
    }

    #[tokio::test]
    async fn test_snapshot_returns_live_publisher() {
        let config = ServerConfig::default();
        let plugins: Vec<Arc<dyn Plugin>> = Vec::new();
        let mut lp = EventLoop::new(&config, &plugins);

        let cam = Publisher::new("test", "cam1", PublishConfig::default());
        publish(&mut lp, &cam).unwrap();

        let (promise, mut done) = Promise::new(StreamPath::from("cam1"));
        lp.handle_request(Request::Snapshot(promise));
        let current = done_now(&mut done).unwrap();
        assert!(current.is_some_and(|p| Arc::ptr_eq(&p, &cam)));

        let (promise, mut done) = Promise::new(StreamPath::from("cam2"));
        lp.handle_request(Request::Snapshot(promise));
        assert!(done_now(&mut done).unwrap().is_none());

        let (promise, mut done) = Promise::new(StreamPath::from("cam1"));
        lp.handle_request(Request::Describe(promise));
        let described = done_now(&mut done).unwrap();
        assert_eq!(described.publisher.map(|p| p.id), Some(cam.id()));
    }

    #[tokio::test]
    async fn test_stop_subscriber_by_id() {
        let config = ServerConfig::default();
        let plugins: Vec<Arc<dyn Plugin>> = Vec::new();
        let mut lp = EventLoop::new(&config, &plugins);

        let sub = Subscriber::new("test", "cam1", SubscribeConfig::default());
        subscribe(&mut lp, &sub).unwrap();

        let (promise, mut done) = Promise::new(sub.id());
        lp.handle_request(Request::StopSubscriber(promise));
        assert_eq!(done_now(&mut done), Ok(()));
        assert_eq!(sub.stop_reason(), Some(Error::StoppedByRequest));

        let (promise, mut done) = Promise::new(999);
        lp.handle_request(Request::StopSubscriber(promise));
        assert_eq!(done_now(&mut done), Err(Error::NotFound(999)));
    }

    #[tokio::test]
    async fn test_termination_unpublishes_and_shrinks_wait_set() {
        let config = ServerConfig::default();
        let plugins: Vec<Arc<dyn Plugin>> = Vec::new();
        let mut lp = EventLoop::new(&config, &plugins);

        let cam = Publisher::new("test", "cam1", PublishConfig::default());
        let sub = Subscriber::new("test", "cam1", SubscribeConfig::default());
        publish(&mut lp, &cam).unwrap();
        subscribe(&mut lp, &sub).unwrap();
        assert_eq!(lp.wait_set_len(), BASE_CASES + 2);

        cam.stop(Error::Stopped("eof".into()));
        let terminated = lp.terminations.next().await.unwrap();
        assert_eq!(terminated, Terminated::Publisher(cam.id()));
        lp.on_terminated(terminated, Instant::now());

        assert_eq!(lp.wait_set_len(), BASE_CASES + 1);
        assert!(lp.registry().publisher(&"cam1".into()).is_none());
        assert_eq!(lp.registry().waiting(&"cam1".into()), vec![sub.id()]);

        sub.stop(Error::StoppedByRequest);
        let terminated = lp.terminations.next().await.unwrap();
        lp.on_terminated(terminated, Instant::now());

        assert_eq!(lp.wait_set_len(), BASE_CASES);
        assert!(lp.registry().waiting(&"cam1".into()).is_empty());
        assert_eq!(lp.registry().live_subscribers().count(), 0);
    }

    #[tokio::test]
    async fn test_pulse_times_out_waiting_subscriber() {
        let config = ServerConfig::default();
        let plugins: Vec<Arc<dyn Plugin>> = Vec::new();
        let mut lp = EventLoop::new(&config, &plugins);

        let sub = Subscriber::new(
            "test",
            "cam1",
            SubscribeConfig::default().wait_timeout(Duration::from_secs(1)),
        );
        subscribe(&mut lp, &sub).unwrap();

        lp.on_pulse(Instant::now() + Duration::from_secs(2));
        assert_eq!(sub.stop_reason(), Some(Error::SubscribeTimeout));
    }

    #[tokio::test]
    async fn test_stop_entities_stops_everything() {
        let config = ServerConfig::default();
        let plugins: Vec<Arc<dyn Plugin>> = Vec::new();
        let mut lp = EventLoop::new(&config, &plugins);

        let cam = Publisher::new("test", "cam1", PublishConfig::default());
        let sub = Subscriber::new("test", "cam2", SubscribeConfig::default());
        publish(&mut lp, &cam).unwrap();
        subscribe(&mut lp, &sub).unwrap();

        lp.stop_entities(&Error::Shutdown);

        assert_eq!(cam.stop_reason(), Some(Error::Shutdown));
        assert_eq!(sub.stop_reason(), Some(Error::Shutdown));
    }
}
