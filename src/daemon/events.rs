use std::sync::mpsc;
use std::thread;
use std::time::Duration;

#[derive(Debug, PartialEq, Eq)]
pub enum Event {
    Tick,
    /// Completion changes have stopped arriving for a debounce interval.
    CompletionSettled,
    /// `notify.toml` was written and has since gone quiet.
    ConfigChanged,
}

pub struct EventHandler {
    tx: mpsc::Sender<Event>,
    rx: mpsc::Receiver<Event>,
}

impl EventHandler {
    pub fn new(tick_rate: Duration) -> Self {
        let (tx, rx) = mpsc::channel();
        let ticker = tx.clone();

        thread::spawn(move || {
            loop {
                thread::sleep(tick_rate);
                if ticker.send(Event::Tick).is_err() {
                    break;
                }
            }
        });

        Self { tx, rx }
    }

    /// For callbacks that want to post back into the loop.
    pub fn sender(&self) -> mpsc::Sender<Event> {
        self.tx.clone()
    }

    pub fn next(&self) -> Result<Event, mpsc::RecvError> {
        self.rx.recv()
    }
}
