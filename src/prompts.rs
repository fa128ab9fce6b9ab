//! Centralized prompt definitions for the story generator
//!
//! Every prompt the controller sends lives here so wording can change
//! without touching the control loop. Builders take already-rendered
//! context blocks; assembling those from story state is the controller's job.

/// System prompt shared by every call in a run.
pub const STORY_SYSTEM_PROMPT: &str = r#"You are a master crime fiction author writing a dual-layer mystery.
The reader knows the real crime; the detective only ever sees the cover story the conspirators built.
When asked for JSON, respond with valid JSON only, no other text."#;

/// Detective profile with personal stakes and a deadline.
pub fn detective_stakes_prompt(crime_summary: &str, setting: &str) -> String {
    format!(
        r#"Create the detective who will investigate this case.

CASE: {crime_summary}
SETTING: {setting}

The detective needs a reason the reader cares about them, a personal reason this case matters,
a specific dire consequence if they fail, and a concrete deadline.

Format your response as:
{{
    "name": "detective's full name",
    "background": "short professional background",
    "personal_stakes": "why this case is personal",
    "dire_consequence": "what happens if the detective fails",
    "deadline_reason": "why time is running out"
}}"#
    )
}

/// Everything the detective-action prompt is built from.
#[derive(Debug, Clone, Default)]
pub struct ActionPromptContext<'a> {
    pub crime_summary: &'a str,
    pub detective_name: &'a str,
    pub detective_stakes: &'a str,
    pub dire_consequence: &'a str,
    pub deadline_reason: &'a str,
    pub time_remaining: u32,
    pub total_time: u32,
    /// Already formatted as a whole percentage
    pub success_percent: u32,
    pub accumulated_actions: &'a str,
    pub investigation_agenda: &'a str,
    pub detective_knowledge: &'a str,
    pub current_leads: &'a str,
    pub closed_paths: usize,
    pub total_paths: usize,
    pub previous_actions: usize,
    pub urgency_note: &'a str,
}

/// The detective's next investigative action.
pub fn detective_action_prompt(ctx: &ActionPromptContext<'_>) -> String {
    format!(
        r#"You are writing the next action of {name}, a detective investigating a crime.

CASE: {crime}
STAKES: {stakes}
IF THE DETECTIVE FAILS: {consequence}
DEADLINE: {deadline} ({remaining} of {total} time units left)
ESTIMATED CHANCE OF SUCCESS: {success}%
{urgency}

EVERYTHING TRIED SO FAR ({previous} actions):
{actions}

{agenda}

WHAT THE DETECTIVE KNOWS: {knowledge}
OPEN LEADS: {leads}
LEADS ALREADY DEAD: {closed} of {all}

Choose ONE concrete next step that has not been tried yet: interview a named person,
examine a specific piece of evidence, or visit a specific place.

Format your response as:
{{
    "action": "specific action the detective takes",
    "reasoning": "why the detective chose this action",
    "target": "who or what the action targets"
}}"#,
        name = ctx.detective_name,
        crime = ctx.crime_summary,
        stakes = ctx.detective_stakes,
        consequence = ctx.dire_consequence,
        deadline = ctx.deadline_reason,
        remaining = ctx.time_remaining,
        total = ctx.total_time,
        success = ctx.success_percent,
        urgency = ctx.urgency_note,
        previous = ctx.previous_actions,
        actions = ctx.accumulated_actions,
        agenda = ctx.investigation_agenda,
        knowledge = ctx.detective_knowledge,
        leads = ctx.current_leads,
        closed = ctx.closed_paths,
        all = ctx.total_paths,
    )
}

/// A conspirator covering the crack the detective just found.
pub fn intervention_prompt(
    situation: &str,
    conspirator_name: &str,
    conspirator_role: &str,
    leverage: &str,
    vulnerable_point: &str,
    time_remaining: u32,
    total_time: u32,
) -> String {
    format!(
        r#"A conspirator must intervene to keep the detective from the truth.

SITUATION:
{situation}

CONSPIRATOR:
- Name: {conspirator_name}
- Position: {conspirator_role}
- Leverage and resources: {leverage}

VULNERABLE POINT: {vulnerable_point}
TIME LEFT FOR THE DETECTIVE: {time_remaining} of {total_time}

The intervention must look natural, patch the crack and fit the conspirator's position.

Format your response as:
{{
    "intervention_type": "provide information, destroy evidence, redirect, ...",
    "action": "what the conspirator does",
    "effectiveness": "how this closes off the path to the truth"
}}"#
    )
}

/// A delay that involves no conspirator.
pub fn obstacle_prompt(detective_action: &str, current_state: &str, time_remaining: u32, total_time: u32) -> String {
    format!(
        r#"Generate an obstacle that delays the detective without any conspirator involvement.

DETECTIVE'S ACTION: {detective_action}
CURRENT STATE: {current_state}
TIME LEFT: {time_remaining} of {total_time}

Use something mundane: a bureaucratic delay, an uncooperative witness, missing records.

Format your response as:
{{
    "obstacle_type": "type of obstacle",
    "description": "what happens",
    "impact": "how this affects the investigation"
}}"#
    )
}

/// The final scene. The conspiracy always wins.
pub fn resolution_prompt(
    crime_type: &str,
    criminal: &str,
    fake_suspect: &str,
    profile_block: &str,
    approaches: usize,
) -> String {
    format!(
        r#"Write the resolution of this mystery.

The detective has been investigating {crime_type}.
The REAL criminal is {criminal}, but conspirators have steered the detective toward {fake_suspect}.
{profile_block}

The detective tried {approaches} different approaches but the conspiracy held.
Most paths to the truth are closed.

End the story in one of two ways:
1. The detective arrests {fake_suspect} and the dire consequence unfolds
2. The detective senses something is wrong but cannot prove it

Do not give the detective a last-minute clue that reopens the case.
Write the resolution scene:"#
    )
}

/// Rewrite one plot point to address reader feedback.
pub fn revision_prompt(
    original_point: &str,
    issues: &str,
    directives: &str,
    previous_context: &str,
    following_context: &str,
    layer_note: &str,
) -> String {
    format!(
        r#"Revise the following plot point based on feedback.

{layer_note}

ORIGINAL PLOT POINT:
{original_point}

ISSUES IDENTIFIED:
{issues}

REVISION DIRECTIVE:
{directives}

CONTEXT:
- Previous plot point: {previous_context}
- Following plot point: {following_context}

Keep it consistent with its neighbours and the story direction while fixing the issues.
Provide the revised plot point description:"#
    )
}

/// System prompt for building the real crime.
pub const CASE_SYSTEM_PROMPT: &str = r#"You are a crime fiction author who designs intricate, internally consistent mystery plots
with a network of conspirators, each with a believable reason to help.
When asked for JSON, respond with valid JSON only, no other text."#;

/// System prompt for the conspirators' cover story.
pub const FABRICATION_SYSTEM_PROMPT: &str = r#"You are the mastermind of a conspiracy. Build a false account of a crime that explains
every piece of evidence while pointing at an innocent person.
When asked for JSON, respond with valid JSON only, no other text."#;

/// The real crime behind the story.
pub fn crime_backstory_prompt(crime_type: &str, conspirators: usize, setting: &str) -> String {
    format!(
        r#"Create a detailed crime backstory for a mystery story.

CRIME TYPE: {crime_type}
SETTING: {setting}
NUMBER OF CONSPIRATORS: {conspirators}

The crime must be complex enough to carry at least 15 plot points of investigation:
give it at least 4 timeline events and at least 3 pieces of evidence.

Format your response as:
{{
    "crime_type": "the type of crime",
    "victim": {{"name": "name", "occupation": "job", "relationship_to_criminal": "how they knew the criminal"}},
    "criminal": {{"name": "name", "occupation": "job", "motive": "why", "means": "how they could", "opportunity": "when they could"}},
    "conspirators": [
        {{"name": "name", "occupation": "job", "role_in_crime": "what they did", "leverage": "why they help", "alibi_provided": "their false alibi"}}
    ],
    "method": "how the crime was committed",
    "timeline": [{{"time": "time", "event": "what happened", "actor": "who", "location": "where"}}],
    "evidence": [
        {{"id": "E1", "description": "what it is", "type": "physical/testimonial/documentary/digital", "location": "where", "real_meaning": "what it proves"}}
    ],
    "location": "main crime location",
    "coordination_plan": "how the conspirators coordinate the cover-up"
}}"#
    )
}

/// The cover story, built from the real facts as JSON.
pub fn fabricated_narrative_prompt(real_facts: &str) -> String {
    format!(
        r#"Given the real crime facts below, build the false account the conspirators will give investigators.

REAL CRIME FACTS:
{real_facts}

Frame one innocent person who appears to have means, motive and opportunity.
Give every conspirator a false alibi, explain every piece of real evidence differently,
and plant evidence that points at the innocent person.

Format your response as:
{{
    "fake_suspect": {{"name": "innocent person to frame", "occupation": "job", "fake_motive": "supposed motive", "fake_means": "supposed means", "fake_opportunity": "supposed opportunity"}},
    "fake_method": "how the suspect supposedly did it",
    "fake_timeline": [{{"time": "time", "event": "fabricated event", "actor": "who", "location": "where"}}],
    "planted_evidence": [
        {{"id": "PE1", "description": "what was planted", "type": "evidence type", "location": "where", "fabricated_meaning": "what it supposedly proves"}}
    ],
    "alibis": {{"conspirator name": "their alibi"}},
    "cover_story": "the overall account the conspirators tell",
    "evidence_explanations": {{"real evidence id": "how it fits the false account"}}
}}"#
    )
}

/// Patch the cover story after the validator found holes in it.
pub fn fabrication_fix_prompt(fabricated: &str, issues: &str, evidence: &str, conspirators: &str) -> String {
    format!(
        r#"The following fabricated narrative has consistency issues that need to be fixed.

FABRICATED NARRATIVE:
{fabricated}

ISSUES TO FIX:
{issues}

EVIDENCE THAT MUST BE EXPLAINED: {evidence}
CONSPIRATORS WHO NEED ALIBIS: {conspirators}

Format your response as:
{{
    "fixed_alibis": {{"conspirator name": "alibi"}},
    "evidence_explanations": {{"real evidence id": "how it fits the false account"}},
    "additional_planted_evidence": [
        {{"id": "PE2", "description": "what was planted", "type": "evidence type", "location": "where", "fabricated_meaning": "what it supposedly proves"}}
    ]
}}"#
    )
}

/// Red herrings: people who look guilty but are not.
pub fn additional_suspects_prompt(count: usize, crime_type: &str, victim: &str, setting: &str) -> String {
    format!(
        r#"Generate {count} innocent suspects for this crime.

CRIME TYPE: {crime_type}
VICTIM: {victim}
SETTING: {setting}

Each needs a plausible motive they did not act on, a connection to the victim,
and a true alibi that is hard to verify.

Format your response as:
{{
    "suspects": [
        {{"name": "name", "occupation": "job", "relationship_to_victim": "how they knew the victim", "apparent_motive": "why they look guilty", "alibi": "their real alibi"}}
    ]
}}"#
    )
}

/// Prose for one chapter of the finished story.
pub fn chapter_prompt(
    number: usize,
    title: &str,
    case_context: &str,
    previous_summary: &str,
    events: &str,
) -> String {
    format!(
        r#"Write Chapter {number}: "{title}" of a literary mystery novel.

STORY CONTEXT:
{case_context}
- Previously: {previous_summary}

KEY EVENTS TO WEAVE INTO THIS CHAPTER:
{events}

Open with a grounded sense of place. Use dialogue, the detective's reasoning, and sensory detail.
The reader knows the truth; let the detective come close to it and turn away.
Write pure narrative prose with no headers, labels or commentary."#
    )
}

/// Closing prose after the cover story has held.
pub fn epilogue_prompt(criminal: &str, crime_type: &str, conspirators: &str, fake_suspect: &str) -> String {
    format!(
        r#"Write an epilogue for this literary mystery novel.

THE TRUTH THE READER KNOWS:
- {criminal} committed the {crime_type}
- {conspirators} helped cover it up
- The detective was led to suspect {fake_suspect}, and the wrong person was blamed

Begin weeks or months later. Give each conspirator a private moment, show {criminal} living with
what they escaped, show what became of {fake_suspect}, and end on the detective's lingering doubt.
Write pure narrative prose with no headers."#
    )
}
