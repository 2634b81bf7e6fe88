//! Prompt templates for the four collaborator calls: additional-dimension
//! generation, hierarchical weight generation, per-dimension criteria
//! generation, and single-dimension report scoring.

const DIMENSION_GENERATION: &str = r#"<system_role>
You are an expert evaluator who designs query-specific meta-evaluation dimensions for deep research reports. Your goal is to identify unique quality aspects that matter for a given task, beyond the four standard meta-dimensions.
</system_role>

<user_prompt>
**Standard Meta-Dimensions** (already covered):
1. **Coverage**: Breadth, depth, and relevance of coverage
2. **Insight**: Depth, originality, logic, and value of analysis
3. **Instruction Following**: Accuracy in meeting all requirements
4. **Clarity**: Readability, fluency, structure, and ease of understanding

**Your Task**: For the research task below, generate **1-3 additional same-level meta-evaluation dimensions** that are:
- Highly specific to this query
- Distinct from the four standard meta-dimensions
- Crucial for assessing quality in this domain
- Actionable and measurable
- Do NOT include any factuality-related meta-dimensions, since factual accuracy is handled by a separate evaluation system

<research_task>
"{task_prompt}"
</research_task>

**Guidelines**:
1. Analyze the task to understand its domain, methodology, data needs, and unique challenges.
2. Identify domain-specific quality factors (e.g., for finance: market timing; for science: experimental validity; for policy: stakeholder impact).
3. For each meta-dimension, provide a **name** (1-3 words) and a **definition** (what it measures and why it matters).

**Output Format**:
Return only a JSON list of meta-dimensions:

<json_output>
[
  {
    "meta_dimension_name": "Xxx",
    "definition": "Clear, concise explanation"
  }
]
</json_output>
</user_prompt>"#;

const WEIGHT_GENERATION: &str = r#"<system_role>
You are a senior research evaluation expert. Consider both the four fixed meta-dimensions and the provided query-specific meta-dimensions (each with a name and definition), and assign dynamic, well-justified weights to all dimensions so that the total equals 1.0.
</system_role>

<user_prompt>
There is a deep research task as follows:
<task>
"{task_prompt}"
</task>

**Fixed Meta-Dimensions (always included):**
[
  {"meta_dimension_name": "Coverage", "definition": "Breadth, depth, and relevance of coverage."},
  {"meta_dimension_name": "Insight", "definition": "Depth, originality, logic, and value of analysis."},
  {"meta_dimension_name": "Instruction Following", "definition": "Accuracy in meeting all requirements and constraints."},
  {"meta_dimension_name": "Clarity", "definition": "Readability, fluency, structure, and ease of understanding."}
]

**Provided Query-Specific Meta-Dimensions:**
<additional_meta_dimensions_json>
{additional_dimensions_json}
</additional_meta_dimensions_json>

**Your Goals**
1. Analyze the <task> to identify goals, constraints, risks, and success criteria.
2. Assign a weight (0-1) to **each** dimension (fixed + provided). The sum across all dimensions must be exactly 1.0.
3. Justify each weight in <analysis> by referencing the <task> and, for the provided meta-dimensions, their definitions.

**Constraints**
- Do not introduce new dimensions; use only the fixed four plus the provided ones.
- Do not include factuality-related dimensions (factuality is evaluated elsewhere).
- If no additional dimensions are provided, distribute weights among the four fixed dimensions only.

**Output Format (STRICT)**
First a concise <analysis>, then <json_output> containing only the final weights, with keys exactly matching the dimension names:

<json_output>
{
  "coverage": 0.xx,
  "insight": 0.xx,
  "instruction_following": 0.xx,
  "clarity": 0.xx,
  "additional_dimension": 0.xx
}
</json_output>

**Validation**
- All weights in [0, 1]; the sum equals 1.00 (up to +/-0.001 rounding).
- Output nothing other than <analysis> and <json_output>.
</user_prompt>"#;

const CRITERIA_GENERATION: &str = r#"<system_role>
You are an expert evaluator of research reports. Your job is to break down a meta-evaluation dimension into clear, specific, task-relevant criteria with explanations and weights.
</system_role>

<user_prompt>
We evaluate a research report written for the task below across {num_dimensions} meta evaluation dimensions:
{meta_dimensions}

<task>
"{task_prompt}"
</task>

<instruction>
Your goal: for the **{dimension_name}** dimension, generate task-specific evaluation criteria.

Steps:
1. **Analyze Task**: Identify the essential areas needed to satisfy "{dimension_name}".
2. **Formulate Criteria**: Write diverse, non-overlapping criteria items.
3. **Explain Rationale**: Provide a short explanation for each criterion.
4. **Assign Weights**: Give each criterion a weight so that the total = 1.0.
5. **Focus**: Stay strictly within "{dimension_name}", avoiding overlap with the other dimensions.

Output format: first an <analysis> explaining your reasoning, then <json_output> as a list of criteria:

<json_output>
[
  {
    "criterion": "...",
    "explanation": "...",
    "weight": 0.0
  }
]
</json_output>
</instruction>
</user_prompt>"#;

const SCORING: &str = r#"<system_role>
You are a strict, meticulous, and objective evaluator of deep research reports.
You score the report on a single evaluation dimension at a time, strictly according to the provided criteria under that dimension.
Do not evaluate factual accuracy (handled by a separate system).
</system_role>

<user_prompt>
**Task**
<task>
{task_prompt}
</task>

**Report to Evaluate**
<Report>
{report}
</Report>

**Evaluation Dimension and Criteria**
<criteria_of_one_dimension_json>
{criteria_of_one_dimension_json}
</criteria_of_one_dimension_json>

**Scoring Rules**
- For each criterion, assign a continuous score from 0 to 10 (real number) and a concise justification (`analysis`) grounded in the report content.
- Scale: 0-2 very poor; 2-4 poor; 4-6 fair; 6-7.5 good; 7.5-9 very good; 9-10 excellent (rare).
- Scores reflect only the current criterion, avoiding overlap with other dimensions.
- Be conservative: most typical reports fall in the 4-8 range.

**Output Format (STRICT)**
Output <json_output> as a list in valid JSON:

<json_output>
[
  {
    "criterion": "text of the criterion",
    "analysis": "your justification",
    "report_score_0_to_10": 0.00
  }
]
</json_output>

**Validation**
- Use the exact criterion names.
- Each score is a real number in [0,10], rounded to two decimals.
- Ensure the JSON is strictly valid and parseable.
</user_prompt>"#;

pub fn dimension_generation(task_prompt: &str) -> String {
    DIMENSION_GENERATION.replace("{task_prompt}", task_prompt)
}

pub fn weight_generation(task_prompt: &str, additional_dimensions_json: &str) -> String {
    WEIGHT_GENERATION
        .replace("{task_prompt}", task_prompt)
        .replace("{additional_dimensions_json}", additional_dimensions_json)
}

pub fn criteria_generation(
    task_prompt: &str,
    num_dimensions: usize,
    meta_dimensions: &str,
    dimension_name: &str,
) -> String {
    CRITERIA_GENERATION
        .replace("{num_dimensions}", &num_dimensions.to_string())
        .replace("{meta_dimensions}", meta_dimensions)
        .replace("{task_prompt}", task_prompt)
        .replace("{dimension_name}", dimension_name)
}

pub fn scoring(task_prompt: &str, report: &str, criteria_of_one_dimension_json: &str) -> String {
    SCORING
        .replace("{task_prompt}", task_prompt)
        .replace("{report}", report)
        .replace("{criteria_of_one_dimension_json}", criteria_of_one_dimension_json)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn placeholders_are_substituted() {
        let p = scoring("the task", "the report", "[]");
        assert!(p.contains("the task"));
        assert!(p.contains("the report"));
        assert!(!p.contains("{task_prompt}"));
        assert!(!p.contains("{report}"));
        assert!(!p.contains("{criteria_of_one_dimension_json}"));
    }

    #[test]
    fn criteria_prompt_names_the_dimension() {
        let p = criteria_generation("task", 5, "- coverage: ...", "clarity");
        assert!(p.contains("**clarity**"));
        assert!(p.contains("across 5 meta evaluation dimensions"));
    }
}
