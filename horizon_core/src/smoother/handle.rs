// horizon_core/src/smoother/handle.rs

use crossbeam_channel::{select, Receiver, Sender};
use std::io;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, info};

use super::queue::{self, TransactionSender};
use super::reader::{SmootherReader, SmootherState};
use super::Smoother;
use crate::error::SubmitError;

#[derive(Debug)]
enum Command {
    ResetDegraded,
    Reset,
    Shutdown,
}

/// A smoother running its cycles on a dedicated thread.
///
/// Dropping the handle stops the thread; use [`SmootherHandle::shutdown`] to get the
/// smoother back.
#[derive(Debug)]
pub struct SmootherHandle {
    commands: Sender<Command>,
    thread: Option<JoinHandle<Smoother>>,
    sender: TransactionSender,
    reader: SmootherReader,
}

impl Smoother {
    /// Moves the smoother onto its own thread. A cycle runs when transactions arrive,
    /// at most once per `optimization_period`.
    pub fn spawn(self) -> io::Result<SmootherHandle> {
        let (commands, command_receiver) = crossbeam_channel::unbounded();
        let sender = self.sender();
        let reader = self.reader();
        let thread = thread::Builder::new()
            .name("horizon-smoother".into())
            .spawn(move || self.run(command_receiver))?;
        Ok(SmootherHandle {
            commands,
            thread: Some(thread),
            sender,
            reader,
        })
    }

    fn handle_command(&mut self, command: Command) -> bool {
        match command {
            Command::ResetDegraded => self.reset_degraded(),
            Command::Reset => self.reset(),
            Command::Shutdown => return false,
        }
        true
    }

    fn run(mut self, commands: Receiver<Command>) -> Smoother {
        let period = Duration::from_secs_f64(self.params.optimization_period);
        let arrivals = self.receiver.clone();
        info!("Smoother thread started (period {:?}).", period);

        loop {
            if self.pending.is_empty() && !(self.dirty && !self.degraded) {
                if !self.degraded {
                    self.shared.set_state(SmootherState::AwaitingTransaction);
                }
                select! {
                    recv(commands) -> command => {
                        if !self.handle_command(command.unwrap_or(Command::Shutdown)) {
                            break;
                        }
                        continue;
                    }
                    recv(arrivals) -> submission => {
                        if let Ok(submission) = submission {
                            queue::push(&mut self.pending, submission, &mut self.next_sequence);
                        }
                    }
                }
            }

            let started = Instant::now();
            self.run_cycle();

            let remaining = period.saturating_sub(started.elapsed());
            select! {
                recv(commands) -> command => {
                    if !self.handle_command(command.unwrap_or(Command::Shutdown)) {
                        break;
                    }
                }
                default(remaining) => {}
            }
        }

        debug!("Smoother thread stopping.");
        self
    }
}

impl SmootherHandle {
    pub fn sender(&self) -> TransactionSender {
        self.sender.clone()
    }

    pub fn reader(&self) -> SmootherReader {
        self.reader.clone()
    }

    pub fn reset_degraded(&self) -> Result<(), SubmitError> {
        self.commands
            .send(Command::ResetDegraded)
            .map_err(|_| SubmitError::Closed)
    }

    pub fn reset(&self) -> Result<(), SubmitError> {
        self.commands.send(Command::Reset).map_err(|_| SubmitError::Closed)
    }

    /// Stops the thread after its current cycle and returns the smoother. Fails only if
    /// the thread panicked.
    pub fn shutdown(mut self) -> thread::Result<Smoother> {
        let _ = self.commands.send(Command::Shutdown);
        match self.thread.take() {
            Some(thread) => thread.join(),
            None => Err(Box::new("smoother thread already joined")),
        }
    }
}

impl Drop for SmootherHandle {
    fn drop(&mut self) {
        if let Some(thread) = self.thread.take() {
            let _ = self.commands.send(Command::Shutdown);
            let _ = thread.join();
        }
    }
}
