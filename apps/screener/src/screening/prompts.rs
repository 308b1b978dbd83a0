// Scoring prompt templates.
// `{job_description}`, `{resume_section}` and `{json_only}` are replaced before sending.

/// Instruction block for one resume. Upload mode fills `{resume_section}` with a
/// pointer to the attached file; text mode with the extracted resume text.
pub const ANALYSIS_PROMPT_TEMPLATE: &str = r#"
Analyze this CV against the job description and provide your assessment in the following JSON format:

{
    "score": <integer between 1-100>,
    "summary": "<detailed summary of at least 400 characters explaining the candidate's fit, strengths, weaknesses, and specific recommendations>",
    "tags": ["<relevant skill/experience tag>", "<experience level tag>", "<education/qualification tag>", "<additional relevant tags>"]
}

Job Description:
{job_description}

{resume_section}

Scoring Guidelines:
- 90-100: Exceptional candidate, immediate hire
- 80-89: Strong candidate, definitely interview
- 70-79: Good candidate, worth considering
- 60-69: Decent candidate with some gaps
- 50-59: Marginal candidate, limited experience
- 40-49: Poor fit, major gaps
- Below 40: Not suitable for role

Focus on:
1. Relevant experience and skills match
2. Education and qualifications alignment
3. Career progression and achievements
4. Technical skills mentioned in job description
5. Overall presentation and professionalism

Summary Requirements:
- Minimum 400 characters
- Mention specific skills, experience, and qualifications from the CV
- Provide constructive feedback and recommendations
- Be specific about strengths and areas for improvement

Tags Requirements:
- At least 3 tags
- Include experience level (e.g., "5+ years experience", "Senior level")
- Include key skills (e.g., "Python expert", "React developer")
- Include education/qualifications (e.g., "Computer Science degree", "MBA")
- Include relevant soft skills or industry experience

Provide specific examples from the CV to support your assessment.
{json_only}
"#;

pub const ATTACHED_RESUME_SECTION: &str = "CV: see the attached file.";

/// Replace `{filename}` before sending.
pub const ATTACHED_FILE_NOTE: &str = "Please analyze this CV file: {filename}";

/// Replace `{resume_text}` before sending.
pub const INLINE_RESUME_SECTION: &str = "CV Content:\n{resume_text}";
