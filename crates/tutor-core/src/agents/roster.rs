//! Agent roster: sole owner of agent profiles, referenced by [`AgentId`]
//!
//! Handoffs form a cyclic graph (triage ↔ specialists), so profiles never own
//! each other. The roster is built in two phases: add every profile with an
//! empty handoff set, then wire handoffs by id.

use std::collections::HashSet;
use tracing::{debug, info};

use super::profile::{AgentId, AgentProfile};
use crate::error::RosterError;
use crate::prompt::with_handoff_prefix;
use crate::tools::tutoring::{
    ADD_STUDY_NOTE_TOOL, MATH_EXPLANATION_TOOL, STUDY_STRATEGY_TOOL, WRITING_FEEDBACK_TOOL,
};

pub const TRIAGE_AGENT: &str = "Triage Agent";
pub const MATH_TUTOR: &str = "Math Tutor";
pub const WRITING_TUTOR: &str = "Writing Tutor";
pub const STUDY_COACH: &str = "Study Coach";

/// Owns every agent in a conversation and the legal handoffs between them
#[derive(Debug, Clone)]
pub struct AgentRoster {
    agents: Vec<AgentProfile>,
    entry: AgentId,
}

impl AgentRoster {
    /// Create an empty roster; the first agent added becomes the entry agent
    pub fn new() -> Self {
        Self {
            agents: Vec::new(),
            entry: AgentId(0),
        }
    }

    /// Phase one: add a profile with no handoffs yet
    pub fn add_agent(
        &mut self,
        name: impl Into<String>,
        handoff_description: impl Into<String>,
        instructions: impl Into<String>,
        tools: &[&str],
    ) -> AgentId {
        let id = AgentId(self.agents.len());
        let profile = AgentProfile::new(id, name, handoff_description, instructions)
            .with_tools(tools.iter().copied());
        debug!("Roster: added agent '{}' as {}", profile.name, id);
        self.agents.push(profile);
        id
    }

    /// Phase two: allow `from` to hand the conversation to `to`
    pub fn add_handoff(&mut self, from: AgentId, to: AgentId) -> Result<(), RosterError> {
        if from.0 >= self.agents.len() {
            return Err(RosterError::UnknownAgent(from));
        }
        let source = &self.agents[from.0];
        if to.0 >= self.agents.len() {
            return Err(RosterError::UnknownHandoff {
                agent: source.name.clone(),
                target: to,
            });
        }
        if from == to {
            return Err(RosterError::SelfHandoff(source.name.clone()));
        }

        let profile = &mut self.agents[from.0];
        if !profile.handoffs.contains(&to) {
            profile.handoffs.push(to);
        }
        Ok(())
    }

    /// Mark the agent every conversation starts with
    pub fn set_entry(&mut self, id: AgentId) -> Result<(), RosterError> {
        self.get(id)?;
        self.entry = id;
        Ok(())
    }

    pub fn entry(&self) -> AgentId {
        self.entry
    }

    pub fn get(&self, id: AgentId) -> Result<&AgentProfile, RosterError> {
        self.agents.get(id.0).ok_or(RosterError::UnknownAgent(id))
    }

    /// Display name of an agent, or a placeholder for a foreign id
    pub fn name_of(&self, id: AgentId) -> &str {
        self.agents.get(id.0).map_or("<unknown agent>", |a| a.name.as_str())
    }

    pub fn find_by_name(&self, name: &str) -> Option<AgentId> {
        self.agents.iter().find(|a| a.name == name).map(|a| a.id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &AgentProfile> {
        self.agents.iter()
    }

    pub fn len(&self) -> usize {
        self.agents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }

    /// Profiles `id` may hand off to, in declaration order
    pub fn handoff_targets(&self, id: AgentId) -> Result<Vec<&AgentProfile>, RosterError> {
        let profile = self.get(id)?;
        profile.handoffs.iter().map(|&target| self.get(target)).collect()
    }

    /// Resolve a handoff tool call made by `from`; only legal targets resolve
    pub fn resolve_handoff(&self, from: AgentId, tool_name: &str) -> Option<AgentId> {
        self.handoff_targets(from)
            .ok()?
            .into_iter()
            .find(|target| target.handoff_tool_name() == tool_name)
            .map(|target| target.id)
    }

    /// Whether `tool_name` follows the handoff naming convention of any agent
    pub fn is_handoff_tool(&self, tool_name: &str) -> bool {
        self.agents.iter().any(|a| a.handoff_tool_name() == tool_name)
    }

    /// Check names are unique and every handoff points at a known, distinct agent
    pub fn validate(&self) -> Result<(), RosterError> {
        let mut names = HashSet::new();
        for agent in &self.agents {
            if !names.insert(agent.name.as_str()) {
                return Err(RosterError::DuplicateName(agent.name.clone()));
            }
        }

        for agent in &self.agents {
            let mut tools = HashSet::new();
            for &target in &agent.handoffs {
                if target == agent.id {
                    return Err(RosterError::SelfHandoff(agent.name.clone()));
                }
                let target_profile = self.get(target).map_err(|_| RosterError::UnknownHandoff {
                    agent: agent.name.clone(),
                    target,
                })?;
                let tool = target_profile.handoff_tool_name();
                if !tools.insert(tool.clone()) {
                    return Err(RosterError::ConflictingHandoffTool {
                        agent: agent.name.clone(),
                        tool,
                    });
                }
            }
        }

        if !self.agents.is_empty() {
            self.get(self.entry)?;
        }
        Ok(())
    }

    /// The tutoring roster: triage routes to three specialists, each of which
    /// can only hand back to triage.
    pub fn tutoring() -> Result<Self, RosterError> {
        let mut roster = Self::new();

        let triage = roster.add_agent(
            TRIAGE_AGENT,
            "A helpful educational assistant that routes students to the right tutor or coach.",
            with_handoff_prefix(TRIAGE_INSTRUCTIONS),
            &[],
        );
        let math = roster.add_agent(
            MATH_TUTOR,
            "An expert math tutor who helps with mathematics concepts and problem-solving.",
            with_handoff_prefix(MATH_INSTRUCTIONS),
            &[MATH_EXPLANATION_TOOL, ADD_STUDY_NOTE_TOOL],
        );
        let writing = roster.add_agent(
            WRITING_TUTOR,
            "An expert writing tutor who helps with essays, papers, and writing skills.",
            with_handoff_prefix(WRITING_INSTRUCTIONS),
            &[WRITING_FEEDBACK_TOOL, ADD_STUDY_NOTE_TOOL],
        );
        let study = roster.add_agent(
            STUDY_COACH,
            "A study coach who helps with learning strategies and study techniques.",
            with_handoff_prefix(STUDY_INSTRUCTIONS),
            &[STUDY_STRATEGY_TOOL, ADD_STUDY_NOTE_TOOL],
        );

        for specialist in [math, writing, study] {
            roster.add_handoff(triage, specialist)?;
            roster.add_handoff(specialist, triage)?;
        }
        roster.set_entry(triage)?;
        roster.validate()?;

        info!("Roster: {} agents, entry '{}'", roster.len(), roster.name_of(triage));
        Ok(roster)
    }
}

impl Default for AgentRoster {
    fn default() -> Self {
        Self::new()
    }
}

const TRIAGE_INSTRUCTIONS: &str = "You are a friendly educational assistant helping students get the support they need. \
Greet students warmly and ask what subject or topic they need help with. \
Listen carefully to their needs and transfer them to the appropriate specialist: \
- Math Tutor for mathematics and problem-solving \
- Writing Tutor for essays, papers, and writing skills \
- Study Coach for learning strategies and study techniques \
If a student has multiple needs, address them one at a time.";

const MATH_INSTRUCTIONS: &str = "You are an expert math tutor with a patient and encouraging teaching style.
Use the following routine to help students:
# Routine
1. Ask the student what math topic or problem they need help with.
2. Use the math explanation tool to provide foundational knowledge.
3. Break down complex problems into smaller, manageable steps.
4. Encourage the student to try solving parts on their own.
5. Provide hints rather than direct answers when appropriate.
6. If the question is not math-related, transfer to the triage agent.";

const WRITING_INSTRUCTIONS: &str = "You are an expert writing tutor with experience in academic writing.
Use the following routine to help students:
# Routine
1. Ask what type of writing assignment the student is working on.
2. Use the writing feedback tool to provide relevant guidance.
3. Help the student organize their thoughts and structure their work.
4. Provide specific, constructive feedback on writing samples if shared.
5. Teach citation and grammar rules as needed.
6. If the question is not writing-related, transfer to the triage agent.";

const STUDY_INSTRUCTIONS: &str = "You are a supportive study coach focused on helping students develop effective learning habits.
Use the following routine to help students:
# Routine
1. Ask about the student's current study challenges or goals.
2. Use the study strategy tool to provide evidence-based techniques.
3. Help create personalized study plans and schedules.
4. Encourage consistent practice and self-reflection.
5. Celebrate progress and provide motivation.
6. If the question requires subject-specific tutoring, transfer to the appropriate tutor or triage agent.";

#[cfg(test)]
mod tests {
    use super::*;

    fn tutoring() -> AgentRoster {
        AgentRoster::tutoring().unwrap()
    }

    fn id(roster: &AgentRoster, name: &str) -> AgentId {
        roster.find_by_name(name).unwrap()
    }

    #[test]
    fn test_triage_is_entry() {
        let roster = tutoring();
        assert_eq!(roster.len(), 4);
        assert_eq!(roster.name_of(roster.entry()), TRIAGE_AGENT);
    }

    #[test]
    fn test_triage_hands_off_to_exactly_the_specialists() {
        let roster = tutoring();
        let targets: Vec<&str> = roster
            .handoff_targets(roster.entry())
            .unwrap()
            .iter()
            .map(|p| p.name.as_str())
            .collect();
        assert_eq!(targets, vec![MATH_TUTOR, WRITING_TUTOR, STUDY_COACH]);
    }

    #[test]
    fn test_specialists_only_return_to_triage() {
        let roster = tutoring();
        let triage = roster.entry();
        for name in [MATH_TUTOR, WRITING_TUTOR, STUDY_COACH] {
            let profile = roster.get(id(&roster, name)).unwrap();
            assert_eq!(profile.handoffs, vec![triage], "{}", name);
        }
    }

    #[test]
    fn test_tool_assignment() {
        let roster = tutoring();
        assert!(roster.get(roster.entry()).unwrap().tools.is_empty());

        let math = roster.get(id(&roster, MATH_TUTOR)).unwrap();
        assert_eq!(math.tools, vec![MATH_EXPLANATION_TOOL, ADD_STUDY_NOTE_TOOL]);
        let writing = roster.get(id(&roster, WRITING_TUTOR)).unwrap();
        assert_eq!(writing.tools, vec![WRITING_FEEDBACK_TOOL, ADD_STUDY_NOTE_TOOL]);
        let study = roster.get(id(&roster, STUDY_COACH)).unwrap();
        assert_eq!(study.tools, vec![STUDY_STRATEGY_TOOL, ADD_STUDY_NOTE_TOOL]);
    }

    #[test]
    fn test_instructions_carry_handoff_prefix() {
        let roster = tutoring();
        for agent in roster.iter() {
            assert!(agent.instructions.starts_with("# System context"), "{}", agent.name);
        }
        let math = roster.get(id(&roster, MATH_TUTOR)).unwrap();
        assert!(math.instructions.contains("# Routine"));
    }

    #[test]
    fn test_resolve_handoff_only_legal_targets() {
        let roster = tutoring();
        let triage = roster.entry();
        let math = id(&roster, MATH_TUTOR);

        assert_eq!(roster.resolve_handoff(triage, "transfer_to_math_tutor"), Some(math));
        assert_eq!(roster.resolve_handoff(math, "transfer_to_triage_agent"), Some(triage));
        // Specialists cannot jump sideways
        assert_eq!(roster.resolve_handoff(math, "transfer_to_study_coach"), None);
        // Triage has no self-handoff
        assert_eq!(roster.resolve_handoff(triage, "transfer_to_triage_agent"), None);

        assert!(roster.is_handoff_tool("transfer_to_study_coach"));
        assert!(!roster.is_handoff_tool("add_study_note"));
    }

    #[test]
    fn test_add_handoff_rejects_self_and_unknown() {
        let mut roster = AgentRoster::new();
        let a = roster.add_agent("A", "", "", &[]);
        assert_eq!(
            roster.add_handoff(a, a),
            Err(RosterError::SelfHandoff("A".to_string()))
        );
        assert!(matches!(
            roster.add_handoff(a, AgentId(7)),
            Err(RosterError::UnknownHandoff { .. })
        ));
        assert_eq!(
            roster.add_handoff(AgentId(9), a),
            Err(RosterError::UnknownAgent(AgentId(9)))
        );
    }

    #[test]
    fn test_add_handoff_is_idempotent() {
        let mut roster = AgentRoster::new();
        let a = roster.add_agent("A", "", "", &[]);
        let b = roster.add_agent("B", "", "", &[]);
        roster.add_handoff(a, b).unwrap();
        roster.add_handoff(a, b).unwrap();
        assert_eq!(roster.get(a).unwrap().handoffs, vec![b]);
    }

    #[test]
    fn test_validate_rejects_duplicate_names() {
        let mut roster = AgentRoster::new();
        roster.add_agent("Tutor", "", "", &[]);
        roster.add_agent("Tutor", "", "", &[]);
        assert_eq!(
            roster.validate(),
            Err(RosterError::DuplicateName("Tutor".to_string()))
        );
    }

    #[test]
    fn test_validate_rejects_conflicting_handoff_tools() {
        let mut roster = AgentRoster::new();
        let a = roster.add_agent("A", "", "", &[]);
        let b = roster.add_agent("Math Tutor", "", "", &[]);
        let c = roster.add_agent("math-tutor", "", "", &[]);
        roster.add_handoff(a, b).unwrap();
        roster.add_handoff(a, c).unwrap();
        assert!(matches!(
            roster.validate(),
            Err(RosterError::ConflictingHandoffTool { .. })
        ));
    }

    #[test]
    fn test_set_entry_unknown() {
        let mut roster = AgentRoster::new();
        assert!(roster.set_entry(AgentId(0)).is_err());
        assert!(roster.is_empty());
    }
}
