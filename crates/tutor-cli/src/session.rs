//! Interactive tutoring session: the REPL around the agent runner

use anyhow::{Context, Result};
use chrono::Utc;
use std::io::{BufRead, Write};
use tracing::{Instrument, debug, info, info_span};
use uuid::Uuid;

use tutor_core::{
    AccumulatedUsage, AgentId, AgentRoster, ChatMessage, RunItem, Runner, StudentContext,
};

const BANNER: [&str; 3] = [
    "Welcome to your AI Tutor & Study Coach!",
    "I can help you with math, writing, and study strategies.",
    "Type 'quit' or 'exit' to end the session.\n",
];

/// True when the line asks to end the session
pub fn is_exit_command(line: &str) -> bool {
    let lowered = line.to_lowercase();
    lowered == "quit" || lowered == "exit"
}

/// Strip one trailing line terminator and nothing else
fn strip_line_terminator(line: &str) -> &str {
    let line = line.strip_suffix('\n').unwrap_or(line);
    line.strip_suffix('\r').unwrap_or(line)
}

/// 16 hex chars identifying one conversation in traces
pub fn new_conversation_id() -> String {
    let mut id = Uuid::new_v4().simple().to_string();
    id.truncate(16);
    id
}

/// Text shown to the student for one run item, if any
pub fn render_item(roster: &AgentRoster, item: &RunItem) -> Option<String> {
    match item {
        RunItem::Message { agent, text } => Some(format!("{}: {}", roster.name_of(*agent), text)),
        RunItem::Handoff { source, target } => Some(format!(
            "[Transferring from {} to {}]",
            roster.name_of(*source),
            roster.name_of(*target)
        )),
        RunItem::ToolCall { .. } | RunItem::ToolOutput { .. } | RunItem::HandoffCall { .. } => None,
    }
}

/// One conversation: current agent, history and notebook carried across turns
pub struct Session {
    runner: Runner<StudentContext>,
    roster: AgentRoster,
    current_agent: AgentId,
    history: Vec<ChatMessage>,
    context: StudentContext,
    conversation_id: String,
    usage: AccumulatedUsage,
}

impl Session {
    /// Start at the roster's entry agent with an empty history
    pub fn new(runner: Runner<StudentContext>, roster: AgentRoster, context: StudentContext) -> Self {
        Self {
            current_agent: roster.entry(),
            runner,
            roster,
            history: Vec::new(),
            context,
            conversation_id: new_conversation_id(),
            usage: AccumulatedUsage::new(),
        }
    }

    pub fn conversation_id(&self) -> &str {
        &self.conversation_id
    }

    pub fn current_agent(&self) -> AgentId {
        self.current_agent
    }

    pub fn context(&self) -> &StudentContext {
        &self.context
    }

    pub fn usage(&self) -> &AccumulatedUsage {
        &self.usage
    }

    /// Read-eval-print until quit, exit or end of input
    pub async fn run<R: BufRead, W: Write>(&mut self, mut input: R, mut output: W) -> Result<()> {
        info!(
            "Session {} started at {}",
            self.conversation_id,
            Utc::now().to_rfc3339()
        );
        for line in BANNER {
            writeln!(output, "{}", line)?;
        }

        let mut buf = String::new();
        loop {
            write!(output, "You: ")?;
            output.flush()?;

            buf.clear();
            let read = input.read_line(&mut buf).context("Failed to read input")?;
            if read == 0 {
                debug!("End of input, closing session");
                break;
            }

            let line = strip_line_terminator(&buf);
            if is_exit_command(line) {
                break;
            }

            self.turn(line, &mut output).await?;
        }

        self.print_summary(&mut output)?;
        info!(
            "Session {} ended ({} model calls, {} tokens)",
            self.conversation_id,
            self.usage.api_calls,
            self.usage.total_tokens()
        );
        Ok(())
    }

    /// Run one user message through the current agent and print the results
    ///
    /// History and current agent only change once the run succeeds.
    async fn turn<W: Write>(&mut self, line: &str, output: &mut W) -> Result<()> {
        let mut history = self.history.clone();
        history.push(ChatMessage::user(line));

        let span = info_span!("tutor_session", group_id = %self.conversation_id);
        let result = self
            .runner
            .run(&self.roster, self.current_agent, history, &mut self.context)
            .instrument(span)
            .await?;

        for item in &result.new_items {
            if let Some(text) = render_item(&self.roster, item) {
                writeln!(output, "{}", text)?;
            }
        }

        self.usage.merge(&result.usage);
        self.history = result.history;
        self.current_agent = result.last_agent;
        debug!(
            "Turn done; current agent '{}', history {} messages",
            self.roster.name_of(self.current_agent),
            self.history.len()
        );
        Ok(())
    }

    fn print_summary<W: Write>(&self, output: &mut W) -> Result<()> {
        writeln!(output, "\nStudy session summary:")?;
        for line in self.context.summary_lines() {
            writeln!(output, "{}", line)?;
        }
        writeln!(output, "\nGood luck with your studies!")?;
        output.flush()?;
        Ok(())
    }
}
