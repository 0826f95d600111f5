use rand::Rng;
use rand::seq::SliceRandom;
use tracing::debug;

use crate::record::QuestionRecord;

/// Hard cap on the number of questions in one run.
pub const MAX_RUN_QUESTIONS: usize = 30;
/// Preselected question count offered on the configuration screen.
pub const DEFAULT_RUN_QUESTIONS: usize = 15;

/// Shown in the feedback slot when the feedback call fails. The results
/// screen itself is never reset over a feedback failure.
pub const FEEDBACK_UNAVAILABLE: &str =
    "No se pudo generar feedback específico, pero ¡sigue estudiando!";

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Configuring,
    InProgress,
    Reporting,
}

/// Allowed question-count range for the configuration screen, derived
/// from the pool size.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CountRange {
    pub min: usize,
    pub max: usize,
    pub default: usize,
}

/// Render commands issued to the external display layer. The machine only
/// decides WHAT to show; layout, styling, and the short pause between
/// answer feedback and the next question all belong to the renderer.
#[derive(Clone, Debug, PartialEq)]
pub enum Screen {
    Upload,
    Loading,
    Configure(CountRange),
    Question {
        index: usize,
        total: usize,
        question: String,
        /// Options in display order (freshly shuffled per question).
        options: Vec<String>,
    },
    Results {
        score: usize,
        total: usize,
        percentage: u8,
    },
}

/// External display collaborator. `patch_feedback` writes into a single
/// fixed slot on the results screen; only one feedback call is ever in
/// flight per results screen, so last write wins is safe.
pub trait Renderer {
    fn show(&mut self, screen: Screen);
    fn patch_feedback(&mut self, feedback: &str);
}

#[derive(thiserror::Error, Debug, PartialEq)]
pub enum SessionError {
    #[error("question count {requested} outside allowed range 1..={max}")]
    CountOutOfRange { requested: usize, max: usize },
    #[error("generation produced no questions")]
    EmptyPool,
    #[error("event is not valid in the {0:?} phase")]
    WrongPhase(Phase),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AnswerOutcome {
    pub correct: bool,
    pub finished: bool,
}

/// In-memory state of one quiz session.
///
/// Fields are private and mutated only through the named transition
/// methods below, so `score + missed.len() == position` holds at every
/// observable point of an active run.
#[derive(Debug)]
pub struct QuizSession {
    phase: Phase,
    pool: Vec<QuestionRecord>,
    selected: Vec<QuestionRecord>,
    position: usize,
    score: usize,
    missed: Vec<QuestionRecord>,
}

impl QuizSession {
    pub fn new() -> Self {
        Self {
            phase: Phase::Idle,
            pool: Vec::new(),
            selected: Vec::new(),
            position: 0,
            score: 0,
            missed: Vec::new(),
        }
    }

    pub fn phase(&self) -> &Phase {
        &self.phase
    }

    pub fn pool(&self) -> &[QuestionRecord] {
        &self.pool
    }

    pub fn selected(&self) -> &[QuestionRecord] {
        &self.selected
    }

    pub fn position(&self) -> usize {
        self.position
    }

    pub fn score(&self) -> usize {
        self.score
    }

    pub fn missed(&self) -> &[QuestionRecord] {
        &self.missed
    }

    /// Selectable question-count range over the current pool:
    /// `[1, min(30, |pool|)]` with a default of `min(15, |pool|)`.
    pub fn count_range(&self) -> CountRange {
        CountRange {
            min: 1,
            max: MAX_RUN_QUESTIONS.min(self.pool.len()),
            default: DEFAULT_RUN_QUESTIONS.min(self.pool.len()),
        }
    }

    pub fn percentage(&self) -> u8 {
        if self.selected.is_empty() {
            return 0;
        }
        ((self.score as f64 / self.selected.len() as f64) * 100.0).round() as u8
    }

    /// The user picked a file; generation is now in flight.
    pub fn document_submitted(&mut self, renderer: &mut impl Renderer) -> Result<(), SessionError> {
        if self.phase != Phase::Idle {
            return Err(SessionError::WrongPhase(self.phase.clone()));
        }
        renderer.show(Screen::Loading);
        Ok(())
    }

    /// Generation succeeded; a non-empty pool moves the session to the
    /// configuration screen. An empty pool means the document was too
    /// short or too generic, and the user is sent back to the upload
    /// screen.
    pub fn pool_ready(
        &mut self,
        pool: Vec<QuestionRecord>,
        renderer: &mut impl Renderer,
    ) -> Result<(), SessionError> {
        if self.phase != Phase::Idle {
            return Err(SessionError::WrongPhase(self.phase.clone()));
        }
        if pool.is_empty() {
            renderer.show(Screen::Upload);
            return Err(SessionError::EmptyPool);
        }
        debug!("pool ready with {} questions", pool.len());
        self.pool = pool;
        self.phase = Phase::Configuring;
        renderer.show(Screen::Configure(self.count_range()));
        Ok(())
    }

    /// Generation failed; back to the nearest safe prior screen.
    pub fn generation_failed(&mut self, renderer: &mut impl Renderer) {
        self.reset();
        renderer.show(Screen::Upload);
    }

    /// Start a run with `count` questions drawn from the pool uniformly
    /// at random without replacement (partial Fisher–Yates). The drawn
    /// order becomes the display order.
    pub fn start_run(
        &mut self,
        count: usize,
        rng: &mut impl Rng,
        renderer: &mut impl Renderer,
    ) -> Result<(), SessionError> {
        if self.phase != Phase::Configuring {
            return Err(SessionError::WrongPhase(self.phase.clone()));
        }
        let range = self.count_range();
        if count < range.min || count > range.max {
            return Err(SessionError::CountOutOfRange {
                requested: count,
                max: range.max,
            });
        }

        let mut indices: Vec<usize> = (0..self.pool.len()).collect();
        let (drawn, _) = indices.partial_shuffle(rng, count);
        self.selected = drawn.iter().map(|&i| self.pool[i].clone()).collect();
        self.position = 0;
        self.score = 0;
        self.missed.clear();
        self.phase = Phase::InProgress;

        debug!("run started with {count} of {} questions", self.pool.len());
        self.render_current(rng, renderer);
        Ok(())
    }

    /// Apply a user answer to the current question. Correctness is exact
    /// text equality against the stored `answer`; display position is
    /// never significant. Completing the last question moves to
    /// `Reporting` and renders the score immediately — the feedback call
    /// is the caller's business and must not block this screen.
    pub fn submit_answer(
        &mut self,
        selected_option: &str,
        rng: &mut impl Rng,
        renderer: &mut impl Renderer,
    ) -> Result<AnswerOutcome, SessionError> {
        if self.phase != Phase::InProgress {
            return Err(SessionError::WrongPhase(self.phase.clone()));
        }

        let current = &self.selected[self.position];
        let correct = selected_option == current.answer;
        if correct {
            self.score += 1;
        } else {
            self.missed.push(current.clone());
        }
        self.position += 1;

        let finished = self.position == self.selected.len();
        if finished {
            self.phase = Phase::Reporting;
            renderer.show(Screen::Results {
                score: self.score,
                total: self.selected.len(),
                percentage: self.percentage(),
            });
        } else {
            self.render_current(rng, renderer);
        }
        Ok(AnswerOutcome { correct, finished })
    }

    /// The feedback call resolved; patch its text into the results screen.
    pub fn feedback_ready(
        &mut self,
        feedback: &str,
        renderer: &mut impl Renderer,
    ) -> Result<(), SessionError> {
        if self.phase != Phase::Reporting {
            return Err(SessionError::WrongPhase(self.phase.clone()));
        }
        renderer.patch_feedback(feedback);
        Ok(())
    }

    /// The feedback call failed; degrade to the fixed apology string.
    pub fn feedback_failed(&mut self, renderer: &mut impl Renderer) -> Result<(), SessionError> {
        self.feedback_ready(FEEDBACK_UNAVAILABLE, renderer)
    }

    /// Back to the configuration screen over the unchanged pool.
    pub fn retry_same_pool(&mut self, renderer: &mut impl Renderer) -> Result<(), SessionError> {
        if self.phase != Phase::Reporting {
            return Err(SessionError::WrongPhase(self.phase.clone()));
        }
        self.selected.clear();
        self.position = 0;
        self.score = 0;
        self.missed.clear();
        self.phase = Phase::Configuring;
        renderer.show(Screen::Configure(self.count_range()));
        Ok(())
    }

    /// Discard everything and return to the upload screen.
    pub fn new_document(&mut self, renderer: &mut impl Renderer) {
        self.reset();
        renderer.show(Screen::Upload);
    }

    fn reset(&mut self) {
        self.phase = Phase::Idle;
        self.pool.clear();
        self.selected.clear();
        self.position = 0;
        self.score = 0;
        self.missed.clear();
    }

    fn render_current(&self, rng: &mut impl Rng, renderer: &mut impl Renderer) {
        let current = &self.selected[self.position];
        let mut options = current.options.clone();
        options.shuffle(rng);
        renderer.show(Screen::Question {
            index: self.position,
            total: self.selected.len(),
            question: current.question.clone(),
            options,
        });
    }
}

impl Default for QuizSession {
    fn default() -> Self {
        Self::new()
    }
}
