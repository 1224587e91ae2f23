//! Tea catalog: tools, a menu resource and brewing prompts.

use async_trait::async_trait;
use serde::Serialize;
use serde_json::{json, Map, Value};
use std::collections::{BTreeMap, HashMap};

use crate::error::{Error, Result};
use crate::mcp::handler::{
    get_string_arg, success_result, PromptHandler, ResourceHandler, ToolHandler,
};
use crate::mcp::params::{PromptParams, ResourceParams, ToolCallParams};
use crate::mcp::prompts::{GetPromptResult, Prompt, PromptArgument, PromptMessage};
use crate::mcp::protocol::{InputSchema, Tool, ToolResponse};
use crate::mcp::resources::{ReadResourceResult, Resource, ResourceContents, ResourceTemplate};

const GREEN: &str = "Green Tea";
const BLACK: &str = "Black Tea";
const OOLONG: &str = "Oolong Tea";
const WHITE: &str = "White Tea";

const TOOL_GET_TEA_NAMES: &str = "getTeaNames";
const TOOL_GET_TEA_INFO: &str = "getTeaInfo";
const TOOL_GET_TEAS_BY_TYPE: &str = "getTeasByType";

const MENU_URI: &str = "menu://tea";

/// One catalog entry.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Tea {
    pub name: String,
    #[serde(rename = "type")]
    pub tea_type: String,
    pub origin: String,
    pub caffeine: String,
    pub flavor: String,
    /// Water temperature in degrees Fahrenheit.
    pub temperature: u16,
    pub steep_time: String,
    pub description: String,
    pub price: f64,
}

#[allow(clippy::too_many_arguments)]
fn tea(
    name: &str,
    tea_type: &str,
    origin: &str,
    caffeine: &str,
    flavor: &str,
    temperature: u16,
    steep_time: &str,
    description: &str,
    price: f64,
) -> Tea {
    Tea {
        name: name.to_string(),
        tea_type: tea_type.to_string(),
        origin: origin.to_string(),
        caffeine: caffeine.to_string(),
        flavor: flavor.to_string(),
        temperature,
        steep_time: steep_time.to_string(),
        description: description.to_string(),
        price,
    }
}

fn default_menu() -> BTreeMap<String, Tea> {
    [
        (
            "dragonwell",
            tea(
                "Dragonwell",
                GREEN,
                "China",
                "Medium",
                "Delicate, sweet, nutty",
                175,
                "2-3 minutes",
                "A classic Chinese green tea with a smooth, mellow flavor and beautiful flat leaves.",
                8.50,
            ),
        ),
        (
            "earl-grey",
            tea(
                "Earl Grey",
                BLACK,
                "England",
                "High",
                "Citrusy, bergamot, bold",
                212,
                "3-5 minutes",
                "A traditional English black tea infused with bergamot oil for a distinctive citrus aroma.",
                7.00,
            ),
        ),
        (
            "da-hong-pao",
            tea(
                "Da Hong Pao",
                OOLONG,
                "China",
                "Medium",
                "Complex, roasted, fruity",
                200,
                "1-2 minutes",
                "A legendary Chinese oolong with a rich, complex flavor and beautiful amber liquor.",
                15.00,
            ),
        ),
        (
            "white-peony",
            tea(
                "White Peony",
                WHITE,
                "China",
                "Low",
                "Subtle, floral, sweet",
                185,
                "4-6 minutes",
                "A delicate white tea with silvery buds and a light, refreshing taste.",
                12.00,
            ),
        ),
        (
            "gyokuro",
            tea(
                "Gyokuro",
                GREEN,
                "Japan",
                "High",
                "Umami, sweet, vegetal",
                140,
                "1-2 minutes",
                "Premium Japanese green tea grown in shade, producing a rich umami flavor.",
                18.00,
            ),
        ),
        (
            "assam",
            tea(
                "Assam",
                BLACK,
                "India",
                "High",
                "Malty, robust, brisk",
                212,
                "3-5 minutes",
                "A full-bodied Indian black tea perfect for breakfast and pairs well with milk.",
                6.50,
            ),
        ),
        (
            "tie-guan-yin",
            tea(
                "Tie Guan Yin",
                OOLONG,
                "China",
                "Medium",
                "Floral, orchid-like, smooth",
                195,
                "1-3 minutes",
                "Iron Goddess of Mercy - a premium Chinese oolong with floral notes and lasting sweetness.",
                13.50,
            ),
        ),
        (
            "silver-needle",
            tea(
                "Silver Needle",
                WHITE,
                "China",
                "Very Low",
                "Delicate, honey, fresh",
                175,
                "5-7 minutes",
                "The most prized white tea made from young buds, offering exceptional delicacy and sweetness.",
                22.00,
            ),
        ),
    ]
    .into_iter()
    .map(|(key, tea)| (key.to_string(), tea))
    .collect()
}

/// Serves the tea catalog over every MCP capability.
pub struct TeaHandler {
    menu: BTreeMap<String, Tea>,
}

impl Default for TeaHandler {
    fn default() -> Self {
        Self::new()
    }
}

impl TeaHandler {
    pub fn new() -> Self {
        Self {
            menu: default_menu(),
        }
    }

    pub fn menu(&self) -> &BTreeMap<String, Tea> {
        &self.menu
    }

    fn lookup(&self, arguments: &HashMap<String, String>, purpose: &str) -> Result<&Tea> {
        let name = arguments
            .get("tea_name")
            .filter(|name| !name.is_empty())
            .ok_or_else(|| {
                Error::InvalidPromptArguments(format!("tea_name is required for {}", purpose))
            })?;
        self.menu.get(name).ok_or_else(|| {
            Error::InvalidPromptArguments(format!("tea '{}' not found in our collection", name))
        })
    }

    fn tea_info(&self, arguments: &Map<String, Value>) -> Result<ToolResponse> {
        let name = get_string_arg(arguments, "name")?;
        match self.menu.get(&name) {
            Some(tea) => Ok(success_result(serde_json::to_string(tea)?)),
            None => Ok(success_result(format!(
                "Tea '{}' not found in our collection",
                name
            ))),
        }
    }

    fn teas_by_type(&self, arguments: &Map<String, Value>) -> Result<ToolResponse> {
        let tea_type = get_string_arg(arguments, "type")?;
        let matching: Vec<&Tea> = self
            .menu
            .values()
            .filter(|tea| tea.tea_type == tea_type)
            .collect();

        if matching.is_empty() {
            return Ok(success_result(format!(
                "No teas found of type '{}'",
                tea_type
            )));
        }
        Ok(success_result(serde_json::to_string(&matching)?))
    }
}

fn string_property(description: &str) -> Value {
    json!({
        "type": "string",
        "description": description,
    })
}

#[async_trait]
impl ToolHandler for TeaHandler {
    async fn list_tools(&self) -> Result<Vec<Tool>> {
        let mut name_props = Map::new();
        name_props.insert(
            "name".to_string(),
            string_property("The name of the tea (e.g., 'dragonwell', 'earl-grey')"),
        );

        let mut type_props = Map::new();
        type_props.insert(
            "type".to_string(),
            string_property(
                "The tea type (e.g., 'Green Tea', 'Black Tea', 'Oolong Tea', 'White Tea')",
            ),
        );

        Ok(vec![
            Tool {
                name: TOOL_GET_TEA_NAMES.to_string(),
                description: "Get a list of all available tea names in our collection".to_string(),
                input_schema: InputSchema::object(Map::new(), &[]),
            },
            Tool {
                name: TOOL_GET_TEA_INFO.to_string(),
                description:
                    "Get detailed information about a specific tea including brewing instructions"
                        .to_string(),
                input_schema: InputSchema::object(name_props, &["name"]),
            },
            Tool {
                name: TOOL_GET_TEAS_BY_TYPE.to_string(),
                description:
                    "Get all teas of a specific type (Green Tea, Black Tea, Oolong Tea, White Tea)"
                        .to_string(),
                input_schema: InputSchema::object(type_props, &["type"]),
            },
        ])
    }

    async fn call_tool(&self, params: ToolCallParams) -> Result<ToolResponse> {
        match params.name.as_str() {
            TOOL_GET_TEA_NAMES => {
                let names: Vec<&String> = self.menu.keys().collect();
                Ok(success_result(serde_json::to_string(&names)?))
            }
            TOOL_GET_TEA_INFO => self.tea_info(&params.arguments),
            TOOL_GET_TEAS_BY_TYPE => self.teas_by_type(&params.arguments),
            _ => Err(Error::ToolNotFound(params.name)),
        }
    }
}

#[async_trait]
impl ResourceHandler for TeaHandler {
    async fn list_resources(&self) -> Result<Vec<Resource>> {
        Ok(vec![Resource {
            uri: MENU_URI.to_string(),
            name: "Tea Menu".to_string(),
            description: None,
            mime_type: None,
        }])
    }

    async fn read_resource(&self, params: ResourceParams) -> Result<ReadResourceResult> {
        if params.uri != MENU_URI {
            return Err(Error::ResourceNotFound(params.uri));
        }
        Ok(ReadResourceResult {
            contents: vec![ResourceContents {
                uri: params.uri,
                mime_type: None,
                text: serde_json::to_string_pretty(&self.menu)?,
            }],
        })
    }

    async fn list_resource_templates(&self) -> Result<Vec<ResourceTemplate>> {
        Ok(Vec::new())
    }
}

fn optional(name: &str, description: &str) -> PromptArgument {
    PromptArgument {
        name: name.to_string(),
        description: description.to_string(),
        required: false,
    }
}

fn required(name: &str, description: &str) -> PromptArgument {
    PromptArgument {
        required: true,
        ..optional(name, description)
    }
}

#[async_trait]
impl PromptHandler for TeaHandler {
    async fn list_prompts(&self) -> Result<Vec<Prompt>> {
        Ok(vec![
            Prompt {
                name: "tea_recommendation".to_string(),
                description: "Get personalized tea recommendations based on preferences"
                    .to_string(),
                arguments: vec![
                    optional(
                        "mood",
                        "Current mood or desired effect (e.g., 'energizing', 'relaxing', 'focus')",
                    ),
                    optional(
                        "caffeine_preference",
                        "Caffeine level preference (e.g., 'high', 'medium', 'low', 'none')",
                    ),
                    optional(
                        "flavor_profile",
                        "Preferred flavor profile (e.g., 'floral', 'robust', 'delicate', 'complex')",
                    ),
                ],
            },
            Prompt {
                name: "brewing_guide".to_string(),
                description: "Get detailed brewing instructions for a specific tea".to_string(),
                arguments: vec![required(
                    "tea_name",
                    "Name of the tea to get brewing instructions for",
                )],
            },
            Prompt {
                name: "tea_pairing".to_string(),
                description: "Get food pairing suggestions for a specific tea".to_string(),
                arguments: vec![required(
                    "tea_name",
                    "Name of the tea to get pairing suggestions for",
                )],
            },
        ])
    }

    async fn get_prompt(&self, params: PromptParams) -> Result<GetPromptResult> {
        let arguments = params.string_arguments();
        let text = match params.name.as_str() {
            "tea_recommendation" => recommendation(&arguments),
            "brewing_guide" => brewing_guide(self.lookup(&arguments, "brewing guide")?),
            "tea_pairing" => pairing(self.lookup(&arguments, "pairing suggestions")?),
            _ => return Err(Error::PromptNotFound(params.name)),
        };

        Ok(GetPromptResult {
            description: None,
            messages: vec![PromptMessage::user_text(text)],
        })
    }
}

fn recommendation(arguments: &HashMap<String, String>) -> String {
    let mut prompt =
        String::from("Based on our tea collection, here are some recommendations:\n\n");
    let arg = |key: &str| arguments.get(key).filter(|v| !v.is_empty());

    if let Some(mood) = arg("mood") {
        prompt.push_str(&format!("For a {} mood:\n", mood));
        prompt.push_str(match mood.as_str() {
            "energizing" => {
                "- Gyokuro (high caffeine, umami flavor)\n- Assam (robust, perfect morning tea)\n"
            }
            "relaxing" => {
                "- White Peony (low caffeine, delicate)\n\
                 - Silver Needle (very low caffeine, honey notes)\n"
            }
            "focus" => {
                "- Earl Grey (bergamot aids concentration)\n\
                 - Da Hong Pao (complex flavors for mindful drinking)\n"
            }
            _ => "",
        });
        prompt.push('\n');
    }

    if let Some(caffeine) = arg("caffeine_preference") {
        prompt.push_str(&format!("For {} caffeine preference:\n", caffeine));
        prompt.push_str(match caffeine.as_str() {
            "high" => "- Gyokuro, Earl Grey, Assam\n",
            "medium" => "- Dragonwell, Da Hong Pao, Tie Guan Yin\n",
            "low" => "- White Peony\n",
            "none" | "very low" => "- Silver Needle\n",
            _ => "",
        });
        prompt.push('\n');
    }

    if let Some(flavor) = arg("flavor_profile") {
        prompt.push_str(&format!("For {} flavor profile:\n", flavor));
        prompt.push_str(match flavor.as_str() {
            "floral" => "- Tie Guan Yin (orchid-like), White Peony (subtle floral)\n",
            "robust" => "- Assam (malty), Earl Grey (bold bergamot)\n",
            "delicate" => "- Silver Needle (honey sweetness), Dragonwell (gentle nuttiness)\n",
            "complex" => "- Da Hong Pao (roasted, fruity), Gyokuro (umami depth)\n",
            _ => "",
        });
    }

    prompt
}

fn brewing_guide(tea: &Tea) -> String {
    format!(
        "# Brewing Guide for {name}

## Tea Information
- **Type**: {tea_type}
- **Origin**: {origin}
- **Caffeine Level**: {caffeine}

## Brewing Instructions
- **Water Temperature**: {temperature}°F
- **Steeping Time**: {steep_time}
- **Flavor Profile**: {flavor}

## Tips
{description}

Enjoy your perfectly brewed {name}!",
        name = tea.name,
        tea_type = tea.tea_type,
        origin = tea.origin,
        caffeine = tea.caffeine,
        temperature = tea.temperature,
        steep_time = tea.steep_time,
        flavor = tea.flavor,
        description = tea.description,
    )
}

fn pairings(tea_type: &str) -> &'static str {
    match tea_type {
        GREEN => "Light appetizers, sushi, steamed vegetables, mild cheeses, fruit tarts",
        BLACK => {
            "Breakfast pastries, chocolate desserts, hearty sandwiches, aged cheeses, spiced foods"
        }
        OOLONG => "Roasted nuts, grilled seafood, dim sum, stone fruits, semi-hard cheeses",
        WHITE => "Fresh fruits, light salads, delicate pastries, soft cheeses, cucumber sandwiches",
        _ => "Light snacks and mild flavors that won't overpower the tea",
    }
}

fn pairing(tea: &Tea) -> String {
    format!(
        "# Food Pairings for {name}

## Tea Profile
- **Type**: {tea_type}
- **Flavor**: {flavor}
- **Origin**: {origin}

## Recommended Pairings
{pairings}

## Why These Pairings Work
The {flavor} characteristics of {name} complement these foods perfectly, creating a harmonious tasting experience.

Price: ${price:.2}",
        name = tea.name,
        tea_type = tea.tea_type,
        flavor = tea.flavor,
        origin = tea.origin,
        pairings = pairings(&tea.tea_type),
        price = tea.price,
    )
}
