// THEORY:
// A `Session` binds a `GlitchPipeline` to the collaborators around it without
// the pipeline knowing they exist:
//
// - a capture source pushes live frames whenever it has one (`submit`),
// - a control surface adjusts alpha and switches effects at any time,
// - a renderer pulls finished frames (`next_output`).
//
// Frames are processed strictly in arrival order, one at a time. The pixel work
// runs on tokio's blocking pool so the async side never stalls on a frame; the
// pipeline is moved into the blocking task and handed back when it finishes.
// Alpha is read fresh for every frame from a watch channel; the effect is read
// by the pipeline itself from the shared selector.

use crate::core_modules::frame::frame::FrameBuffer;
use crate::core_modules::selector::{Effect, EffectSelector};
use crate::error::GlitchError;
use crate::pipeline::{FrameReport, GlitchPipeline};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Frames that may wait in each direction before `submit` applies backpressure.
pub const DEFAULT_CAPACITY: usize = 4;

/// A rendered frame and the report that produced it.
#[derive(Debug, Clone)]
pub struct ProcessedFrame {
    pub frame: FrameBuffer,
    pub report: FrameReport,
}

/// The collaborator-facing side of a running session.
pub struct SessionHandle {
    frame_tx: mpsc::Sender<FrameBuffer>,
    output_rx: mpsc::Receiver<ProcessedFrame>,
    alpha_tx: watch::Sender<f32>,
    selector: EffectSelector,
    task: JoinHandle<Result<GlitchPipeline, GlitchError>>,
}

pub struct Session;

impl Session {
    /// Starts the frame loop on the current tokio runtime.
    pub fn spawn(pipeline: GlitchPipeline, capacity: usize) -> SessionHandle {
        let (frame_tx, frame_rx) = mpsc::channel::<FrameBuffer>(capacity.max(1));
        let (output_tx, output_rx) = mpsc::channel::<ProcessedFrame>(capacity.max(1));
        let (alpha_tx, alpha_rx) = watch::channel(pipeline.alpha());
        let selector = pipeline.selector();

        let task = tokio::spawn(Self::run(pipeline, frame_rx, output_tx, alpha_rx));

        SessionHandle {
            frame_tx,
            output_rx,
            alpha_tx,
            selector,
            task,
        }
    }

    async fn run(
        mut pipeline: GlitchPipeline,
        mut frame_rx: mpsc::Receiver<FrameBuffer>,
        output_tx: mpsc::Sender<ProcessedFrame>,
        alpha_rx: watch::Receiver<f32>,
    ) -> Result<GlitchPipeline, GlitchError> {
        while let Some(live) = frame_rx.recv().await {
            let alpha = *alpha_rx.borrow();

            let (returned, outcome) = tokio::task::spawn_blocking(move || {
                pipeline.set_alpha(alpha);
                let outcome = pipeline.generate_report(&live).map(|report| ProcessedFrame {
                    frame: pipeline.result().clone(),
                    report,
                });
                (pipeline, outcome)
            })
            .await
            .map_err(|_| GlitchError::SessionClosed)?;
            pipeline = returned;

            match outcome {
                Ok(processed) => {
                    if output_tx.send(processed).await.is_err() {
                        debug!("renderer went away, stopping session");
                        break;
                    }
                }
                Err(error) => warn!(%error, "dropping frame"),
            }
        }

        Ok(pipeline)
    }
}

impl SessionHandle {
    /// Hands a live frame to the session, waiting if the queue is full.
    pub async fn submit(&self, frame: FrameBuffer) -> Result<(), GlitchError> {
        self.frame_tx.send(frame).await.map_err(|_| GlitchError::SessionClosed)
    }

    /// The next rendered frame, or `None` once the session has stopped.
    pub async fn next_output(&mut self) -> Option<ProcessedFrame> {
        self.output_rx.recv().await
    }

    /// Blend weight for every frame processed from now on.
    pub fn set_alpha(&self, alpha: f32) {
        self.alpha_tx.send_replace(alpha);
    }

    pub fn select(&self, effect: Effect) {
        self.selector.select(effect);
    }

    /// Stops accepting frames, discards undelivered output and returns the
    /// pipeline once the frame in flight has finished.
    pub async fn shutdown(self) -> Result<GlitchPipeline, GlitchError> {
        let Self {
            frame_tx,
            output_rx,
            task,
            ..
        } = self;
        drop(frame_tx);
        drop(output_rx);
        task.await.map_err(|_| GlitchError::SessionClosed)?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::PipelineConfig;

    fn pipeline(width: u32, height: u32) -> GlitchPipeline {
        let config = PipelineConfig {
            threads: Some(2),
            seed: 5,
            ..PipelineConfig::new(width, height)
        };
        GlitchPipeline::new(config, FrameBuffer::filled(width, height, [10, 20, 30])).unwrap()
    }

    #[tokio::test]
    async fn frames_come_back_in_order() {
        let mut session = Session::spawn(pipeline(4, 2), DEFAULT_CAPACITY);

        for value in [50u8, 100, 150] {
            session.submit(FrameBuffer::filled(4, 2, [value; 3])).await.unwrap();
        }
        for expected in 0..3 {
            let processed = session.next_output().await.expect("output");
            assert_eq!(processed.report.frame_index, expected);
        }

        let pipeline = session.shutdown().await.unwrap();
        assert_eq!(pipeline.frames_processed(), 3);
    }

    #[tokio::test]
    async fn alpha_is_read_for_each_frame() {
        let mut session = Session::spawn(pipeline(4, 2), DEFAULT_CAPACITY);

        session.set_alpha(0.5);
        session.submit(FrameBuffer::filled(4, 2, [200; 3])).await.unwrap();
        let processed = session.next_output().await.expect("output");

        assert!(processed.frame.pixels().all(|px| px == [105, 110, 115]));
        session.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn effect_changes_reach_the_loop() {
        let mut session = Session::spawn(pipeline(6, 6), DEFAULT_CAPACITY);

        session.select(Effect::ScanLine);
        session.submit(FrameBuffer::new(6, 6)).await.unwrap();
        let processed = session.next_output().await.expect("output");

        assert_eq!(processed.report.effect, Effect::ScanLine);
        session.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn mismatched_frames_are_dropped_not_fatal() {
        let mut session = Session::spawn(pipeline(4, 4), DEFAULT_CAPACITY);

        session.submit(FrameBuffer::new(3, 3)).await.unwrap();
        session.submit(FrameBuffer::new(4, 4)).await.unwrap();
        let processed = session.next_output().await.expect("output");

        assert_eq!(processed.report.frame_index, 0);
        assert_eq!(processed.frame.dimensions(), FrameBuffer::new(4, 4).dimensions());
        session.shutdown().await.unwrap();
    }
}
