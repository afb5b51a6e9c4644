use std::io::{self, BufRead};
use std::sync::mpsc::{self, Receiver};
use std::thread;

/// Reads console lines on a helper thread so the tick loop never blocks.
/// The channel disconnects when stdin is closed.
pub fn spawn_stdin_reader() -> Receiver<String> {
    let (sender, receiver) = mpsc::channel();
    thread::spawn(move || {
        for line in io::stdin().lock().lines() {
            let Ok(line) = line else { break };
            if sender.send(line).is_err() {
                break;
            }
        }
    });
    receiver
}
