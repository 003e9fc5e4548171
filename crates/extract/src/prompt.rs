use crate::schema::AnalysisMode;

pub fn build_prompt(mode: AnalysisMode, raw_text: &str) -> String {
    match mode {
        AnalysisMode::Email => build_email_prompt(raw_text),
        AnalysisMode::Meeting => build_meeting_prompt(raw_text),
    }
}

pub fn build_email_prompt(email_text: &str) -> String {
    format!(
        r#"You are an expert project management assistant. Analyze the following email and extract structured project information.

EMAIL CONTENT:
{}

CRITICAL: Your response must be ONLY valid JSON with no additional text, explanations, or markdown formatting. Do not wrap the JSON in code blocks or backticks.

SCHEMA:
{{
  "email_metadata": {{
    "subject": "string (extract from email if present)",
    "from": "string (sender name/email if mentioned)",
    "date": "string (extract if mentioned, otherwise 'Not specified')",
    "project_name": "string (infer from context)"
  }},
  "action_items": [
    {{"task": "string", "assignee": "string (name of person responsible)", "due_date": "string (extract if mentioned, otherwise 'Not specified')", "priority": "High|Medium|Low"}}
  ],
  "decisions": [
    {{"decision": "string", "context": "string (brief explanation)"}}
  ],
  "risks": [
    {{"risk": "string (description of the risk)", "severity": "High|Medium|Low", "impact": "string (what this affects)", "mentioned_by": "string (who raised it)"}}
  ],
  "key_topics": ["array of main topics discussed"],
  "status_updates": [
    {{"area": "string (what aspect of the project)", "status": "string (the update or information)", "type": "Progress|Blocker|Delay|Resource Issue|Budget|Other"}}
  ],
  "project_health": {{
    "status": "On Track|At Risk|Blocked",
    "summary": "string (1-2 sentence overall assessment based on email content)"
  }}
}}

RULES:
- Be thorough but concise
- Look for status updates, supply chain delays, resource bottlenecks, client concerns, timeline slips, budget variances, blockers and risks
- If information isn't present, use "Not specified" or empty arrays as appropriate
- Output ONLY the JSON object, no markdown, no explanations"#,
        email_text
    )
}

pub fn build_meeting_prompt(transcript: &str) -> String {
    format!(
        r#"You are an expert project management assistant. Analyze the following meeting transcript and extract structured project information.

MEETING TRANSCRIPT:
{}

CRITICAL: Your response must be ONLY valid JSON with no additional text, explanations, or markdown formatting. Do not wrap the JSON in code blocks or backticks.

SCHEMA:
{{
  "meeting_metadata": {{
    "project_name": "string (infer from context)",
    "date": "string (extract if mentioned, otherwise 'Not specified')",
    "attendees": ["names of people present"]
  }},
  "action_items": [
    {{"task": "string", "assignee": "string (name of person responsible)", "due_date": "string (extract if mentioned, otherwise 'Not specified')", "priority": "High|Medium|Low"}}
  ],
  "decisions": [
    {{"decision": "string", "context": "string (brief explanation)"}}
  ],
  "risks": [
    {{"risk": "string (description of the risk)", "severity": "High|Medium|Low", "impact": "string (what this affects)", "mentioned_by": "string (who raised it)"}}
  ],
  "key_topics": ["array of main topics discussed"],
  "project_health": {{
    "status": "On Track|At Risk|Blocked",
    "summary": "string (1-2 sentence overall assessment based on the discussion)"
  }}
}}

RULES:
- Capture every commitment as an action item, including who owns it and when it is due
- Record decisions and the reasoning behind them
- Flag risks even when they are only implied
- If information isn't present, use "Not specified" or empty arrays as appropriate
- Output ONLY the JSON object, no markdown, no explanations"#,
        transcript
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_email_prompt_embeds_text_and_schema() {
        let text = "Subject: Delay. Equipment arrives Dec 5 instead of Nov 30.";
        let prompt = build_prompt(AnalysisMode::Email, text);

        assert!(prompt.contains(text));
        assert!(prompt.contains("\"email_metadata\""));
        assert!(prompt.contains("\"status_updates\""));
        assert!(prompt.contains("Progress|Blocker|Delay|Resource Issue|Budget|Other"));
        assert!(prompt.contains("ONLY"));
        assert!(!prompt.contains("\"meeting_metadata\""));
    }

    #[test]
    fn test_meeting_prompt_has_attendees_and_no_status_updates() {
        let prompt = build_prompt(AnalysisMode::Meeting, "Sarah: we're on track.");

        assert!(prompt.contains("Sarah: we're on track."));
        assert!(prompt.contains("\"attendees\""));
        assert!(!prompt.contains("\"status_updates\""));
    }

    #[test]
    fn test_prompt_is_deterministic_and_keeps_braces_verbatim() {
        let text = "config = { \"a\": 1 }";
        assert_eq!(build_email_prompt(text), build_email_prompt(text));
        assert!(build_email_prompt(text).contains(text));
    }
}
