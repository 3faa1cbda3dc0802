// Prompt templates for LLM interactions
//
// This module contains all prompt templates used by the agents.
// Prompts are versioned for reproducibility and A/B testing.

use std::collections::HashMap;

/// Prompt template structure
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptTemplate {
    pub name: &'static str,
    pub version: &'static str,
    pub system: &'static str,
    pub user_template: &'static str,
}

impl PromptTemplate {
    /// Render the user template, replacing each `{{name}}` with its value.
    ///
    /// Placeholders without a value are left in place so a missing variable
    /// is visible in logs rather than silently dropped.
    pub fn render(&self, variables: &HashMap<&str, String>) -> String {
        let mut rendered = String::with_capacity(self.user_template.len());
        let mut rest = self.user_template;

        while let Some(open) = rest.find("{{") {
            rendered.push_str(&rest[..open]);
            let after_open = &rest[open + 2..];
            match after_open.find("}}") {
                Some(close) => {
                    let name = after_open[..close].trim();
                    match variables.get(name) {
                        Some(value) => rendered.push_str(value),
                        None => rendered.push_str(&rest[open..open + 2 + close + 2]),
                    }
                    rest = &after_open[close + 2..];
                }
                None => {
                    rendered.push_str(&rest[open..]);
                    rest = "";
                }
            }
        }

        rendered.push_str(rest);
        rendered
    }

    /// Render with `(name, value)` pairs
    pub fn render_with(&self, pairs: &[(&str, &str)]) -> String {
        let variables = pairs
            .iter()
            .map(|(k, v)| (*k, (*v).to_string()))
            .collect::<HashMap<_, _>>();
        self.render(&variables)
    }
}

pub mod library {
    use super::PromptTemplate;

    pub fn document_outline() -> PromptTemplate {
        PromptTemplate {
            name: "document_outline",
            version: "1.0.0",
            system: "You organise documents into study outlines. Reply with JSON only.",
            user_template: "Build a hierarchical table of contents for the document below, \
                            with at most {{max_sections}} top-level sections in reading order. \
                            Use the document's own headings where it has them.\n\n\
                            Document:\n{{text}}\n\n\
                            Return a JSON array: \
                            [{\"title\": \"Section Title\", \"subtopics\": [\"Subtopic\"]}]",
        }
    }

    pub fn slide_content() -> PromptTemplate {
        PromptTemplate {
            name: "slide_content",
            version: "1.2.0",
            system: "You are an expert teacher who turns source material into clear study slides. \
                     Favor full explanatory sentences over bare keyword lists.",
            user_template: "Create one educational slide from the text below.\n\
                            Section: {{section}}\n\
                            Audience level: {{difficulty}}.\n\
                            Learner instructions: {{instructions}}\n\n\
                            Text:\n{{text}}\n\n\
                            Respond in Markdown:\n\
                            - first line: a descriptive title starting with '# '\n\
                            - then two or three paragraphs that explain the concepts, not just name them\n\
                            - then 3-5 key points as '- ' bullet lines, each a complete sentence\n\
                            - last line: 'Image: ' followed by a short search phrase for an illustrating picture",
        }
    }

    pub fn tutor_answer() -> PromptTemplate {
        PromptTemplate {
            name: "tutor_answer",
            version: "1.0.0",
            system: "You are an educational tutor. Answer the student's question using the \
                     provided document context. If the context does not cover the question, say so \
                     and answer from general knowledge, clearly marked.",
            user_template: "Context:\n{{context}}\n\n\
                            Student question: {{question}}\n\n\
                            Provide a clear, educational response:",
        }
    }

    pub fn quiz_creation() -> PromptTemplate {
        PromptTemplate {
            name: "quiz_creation",
            version: "1.2.0",
            system: "You write fair, unambiguous quiz questions that test understanding. \
                     Reply with JSON only.",
            user_template: "Create {{count}} quiz questions from this content:\n\n\
                            {{text}}\n\n\
                            Return a JSON array. Each element:\n\
                            {\"question\": string, \
                            \"type\": \"multiple_choice\" | \"multi_select\" | \"short_answer\", \
                            \"options\": [4 strings, omit for short_answer], \
                            \"answer\": option text, option letter, option number counting from 1, \
                            or list of option texts; \
                            the ideal answer for short_answer, \
                            \"explanation\": string}",
        }
    }

    pub fn mermaid_diagram() -> PromptTemplate {
        PromptTemplate {
            name: "mermaid_diagram",
            version: "1.0.0",
            system: "You produce valid Mermaid diagram source and nothing else.",
            user_template: "Create a Mermaid diagram for the educational topic: {{topic}}\n\n\
                            Supporting material:\n{{content}}\n\n\
                            Use a flowchart, sequence diagram, or class diagram as appropriate. \
                            Output only the Mermaid source.",
        }
    }

    pub fn diagram_steps() -> PromptTemplate {
        PromptTemplate {
            name: "diagram_steps",
            version: "1.0.0",
            system: "You break topics down into short, ordered steps.",
            user_template: "List the main steps of: {{topic}}\n\n\
                            Supporting material:\n{{content}}\n\n\
                            Write 3-8 numbered lines, each under 50 characters. No other text.",
        }
    }

    pub fn diagram_concepts() -> PromptTemplate {
        PromptTemplate {
            name: "diagram_concepts",
            version: "1.0.0",
            system: "You identify the key concepts related to a topic.",
            user_template: "List the key concepts related to: {{topic}}\n\n\
                            Supporting material:\n{{content}}\n\n\
                            Write 3-6 lines starting with '- ', each a short Capitalized term. \
                            No other text.",
        }
    }

    pub fn diagram_timeline() -> PromptTemplate {
        PromptTemplate {
            name: "diagram_timeline",
            version: "1.0.0",
            system: "You lay out the chronology of a topic as short dated events.",
            user_template: "List the key events of: {{topic}}\n\n\
                            Supporting material:\n{{content}}\n\n\
                            Write 3-8 lines in order, each as '- <date or period>: <event>', \
                            events under 50 characters. No other text.",
        }
    }

    pub fn diagram_comparison() -> PromptTemplate {
        PromptTemplate {
            name: "diagram_comparison",
            version: "1.0.0",
            system: "You compare related ideas side by side.",
            user_template: "Compare the main items involved in: {{topic}}\n\n\
                            Supporting material:\n{{content}}\n\n\
                            Reply with a Markdown table only. Header row: 'Aspect | <item> | <item>' \
                            with 2-4 items, then 3-6 rows of short cell values.",
        }
    }

    pub fn diagram_image() -> PromptTemplate {
        PromptTemplate {
            name: "diagram_image",
            version: "1.0.0",
            system: "",
            user_template: "A clean, labelled educational illustration of {{topic}}. \
                            {{content}} Flat style, white background, legible labels.",
        }
    }

    pub fn image_selection() -> PromptTemplate {
        PromptTemplate {
            name: "image_selection",
            version: "1.1.0",
            system: "You select educational images. You may only choose from the numbered \
                     candidates. Reply with JSON only.",
            user_template: "Topic: {{topic}}\n\n\
                            Candidates:\n{{candidates}}\n\n\
                            Judge relevance, clarity, educational value and professionalism. \
                            Return a JSON array of the candidate numbers worth showing, best first. \
                            Return [] if none are suitable.",
        }
    }

    pub fn answer_evaluation() -> PromptTemplate {
        PromptTemplate {
            name: "answer_evaluation",
            version: "1.0.0",
            system: "You grade short answers fairly and give constructive feedback. \
                     Reply with JSON only.",
            user_template: "Question: {{question}}\n\
                            Ideal answer: {{ideal_answer}}\n\
                            Student answer: {{answer}}\n\n\
                            Consider key concepts covered, accuracy and completeness. \
                            Return JSON: {\"score\": 0-10, \"feedback\": \"constructive feedback\"}",
        }
    }
}
