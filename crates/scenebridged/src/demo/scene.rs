//! In-memory scene graph standing in for a real host's object model.

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::{Value, json};

use crate::registry::{
    ActionContext, ActionSpec, ActionTable, Arguments, Color, CommandError, CommandHandler,
    ParamKind, ParamSpec,
};

const KINDS: &[&str] = &["Empty", "Cube", "Sphere", "Plane", "Light", "Camera"];

/// One object in the scene.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SceneObject {
    name: String,
    kind: &'static str,
    position: [f64; 3],
    rotation: [f64; 3],
    scale: [f64; 3],
    color: Color,
    parent: Option<String>,
    visible: bool,
}

/// `scene` domain: objects addressed by unique name.
#[derive(Debug, Default)]
pub struct SceneHandler {
    objects: BTreeMap<String, SceneObject>,
}

type Outcome = Result<Value, CommandError>;

impl SceneHandler {
    /// Creates an empty scene.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn object(&self, name: &str) -> Result<&SceneObject, CommandError> {
        self.objects
            .get(name)
            .ok_or_else(|| CommandError::handler(format!("object not found: {name}")))
    }

    fn object_mut(&mut self, name: &str) -> Result<&mut SceneObject, CommandError> {
        self.objects
            .get_mut(name)
            .ok_or_else(|| CommandError::handler(format!("object not found: {name}")))
    }

    fn children<'a>(&'a self, parent: &'a str) -> impl Iterator<Item = &'a SceneObject> {
        self.objects
            .values()
            .filter(move |object| object.parent.as_deref() == Some(parent))
    }

    fn descendants(&self, root: &str) -> Vec<String> {
        let mut found = vec![root.to_owned()];
        let mut cursor = 0;
        while let Some(name) = found.get(cursor).cloned() {
            found.extend(self.children(&name).map(|child| child.name.clone()));
            cursor += 1;
        }
        found
    }

    fn create(&mut self, _: &mut ActionContext<'_>, arguments: &Arguments) -> Outcome {
        let name = arguments.str("name")?;
        if self.objects.contains_key(name) {
            return Err(CommandError::handler(format!("object already exists: {name}")));
        }
        let parent = arguments.opt_str("parent").map(str::to_owned);
        if let Some(parent) = &parent {
            self.object(parent)?;
        }
        let object = SceneObject {
            name: name.to_owned(),
            kind: arguments.enum_value("kind")?,
            position: arguments.vector3("position")?,
            rotation: arguments.vector3("rotation")?,
            scale: arguments.vector3("scale")?,
            color: arguments.color("color")?,
            parent,
            visible: arguments.bool("visible")?,
        };
        let created = json!(object);
        self.objects.insert(name.to_owned(), object);
        Ok(created)
    }

    fn delete(&mut self, context: &mut ActionContext<'_>, arguments: &Arguments) -> Outcome {
        let name = arguments.str("name")?;
        self.object(name)?;
        let removed = self.descendants(name);
        for object in &removed {
            self.objects.remove(object);
            context.session_mut().forget_entity(object);
        }
        Ok(json!({ "deleted": removed }))
    }

    fn find(&mut self, _: &mut ActionContext<'_>, arguments: &Arguments) -> Outcome {
        let pattern = arguments
            .opt_str("name_contains")
            .map(str::to_ascii_lowercase);
        let kind = arguments.opt_enum("kind");
        let matches: Vec<&SceneObject> = self
            .objects
            .values()
            .filter(|object| {
                pattern
                    .as_deref()
                    .is_none_or(|pattern| object.name.to_ascii_lowercase().contains(pattern))
            })
            .filter(|object| kind.is_none_or(|kind| object.kind == kind))
            .collect();
        Ok(json!({ "objects": matches, "count": matches.len() }))
    }

    fn set_transform(&mut self, _: &mut ActionContext<'_>, arguments: &Arguments) -> Outcome {
        let object = self.object_mut(arguments.str("name")?)?;
        if let Some(position) = arguments.opt_vector3("position") {
            object.position = position;
        }
        if let Some(rotation) = arguments.opt_vector3("rotation") {
            object.rotation = rotation;
        }
        if let Some(scale) = arguments.opt_vector3("scale") {
            object.scale = scale;
        }
        Ok(json!(object))
    }

    fn set_parent(&mut self, _: &mut ActionContext<'_>, arguments: &Arguments) -> Outcome {
        let name = arguments.str("name")?;
        self.object(name)?;
        let parent = arguments.opt_str("parent");
        if let Some(parent) = parent {
            self.object(parent)?;
            if self.descendants(name).iter().any(|object| object == parent) {
                return Err(CommandError::handler(format!(
                    "cannot parent '{name}' under its own descendant '{parent}'"
                )));
            }
        }
        let object = self.object_mut(name)?;
        object.parent = parent.map(str::to_owned);
        Ok(json!(object))
    }

    fn hierarchy_node(&self, object: &SceneObject) -> Value {
        let children: Vec<Value> = self
            .children(&object.name)
            .map(|child| self.hierarchy_node(child))
            .collect();
        json!({ "name": object.name, "kind": object.kind, "children": children })
    }

    fn hierarchy(&mut self, _: &mut ActionContext<'_>, _: &Arguments) -> Outcome {
        let roots: Vec<Value> = self
            .objects
            .values()
            .filter(|object| object.parent.is_none())
            .map(|object| self.hierarchy_node(object))
            .collect();
        Ok(json!({ "roots": roots, "objectCount": self.objects.len() }))
    }

    fn select(&mut self, context: &mut ActionContext<'_>, arguments: &Arguments) -> Outcome {
        let name = arguments.str("name")?;
        self.object(name)?;
        let session = context.session_mut();
        if !arguments.bool("additive")? {
            session.clear_selected();
        }
        session.add_selected(name);
        session.set_focused(name);
        Ok(json!({ "selected": session.selected(), "focused": name }))
    }

    fn selection(&mut self, context: &mut ActionContext<'_>, _: &Arguments) -> Outcome {
        let objects: Vec<&SceneObject> = context
            .session()
            .selected()
            .iter()
            .filter_map(|name| self.objects.get(name))
            .collect();
        Ok(json!({ "objects": objects, "count": objects.len() }))
    }
}

impl CommandHandler for SceneHandler {
    fn declare(&self, actions: &mut ActionTable<Self>) {
        let name = || ParamSpec::required("name", ParamKind::String);
        actions
            .add(
                ActionSpec::new("Create")
                    .param(name())
                    .param(
                        ParamSpec::optional("kind", ParamKind::Enum(KINDS))
                            .with_default(json!("Empty")),
                    )
                    .param(
                        ParamSpec::optional("position", ParamKind::Vector3)
                            .with_default(json!([0, 0, 0])),
                    )
                    .param(
                        ParamSpec::optional("rotation", ParamKind::Vector3)
                            .with_default(json!([0, 0, 0])),
                    )
                    .param(
                        ParamSpec::optional("scale", ParamKind::Vector3)
                            .with_default(json!([1, 1, 1])),
                    )
                    .param(
                        ParamSpec::optional("color", ParamKind::Color)
                            .with_default(json!([1, 1, 1, 1])),
                    )
                    .param(ParamSpec::optional("parent", ParamKind::String))
                    .param(ParamSpec::optional("visible", ParamKind::Bool).with_default(json!(true)))
                    .describe("Creates an object"),
                Self::create,
            )
            .add(
                ActionSpec::new("Delete")
                    .param(name())
                    .describe("Deletes an object and its descendants"),
                Self::delete,
            )
            .add(
                ActionSpec::new("Find")
                    .param(ParamSpec::optional("name_contains", ParamKind::String))
                    .param(ParamSpec::optional("kind", ParamKind::Enum(KINDS)))
                    .describe("Finds objects by name fragment and kind"),
                Self::find,
            )
            .add(ActionSpec::new("Get").param(name()), |scene, _, arguments| {
                scene.object(arguments.str("name")?).map(|object| json!(object))
            })
            .add(
                ActionSpec::new("SetTransform")
                    .param(name())
                    .param(ParamSpec::optional("position", ParamKind::Vector3))
                    .param(ParamSpec::optional("rotation", ParamKind::Vector3))
                    .param(ParamSpec::optional("scale", ParamKind::Vector3)),
                Self::set_transform,
            )
            .add(
                ActionSpec::new("SetColor")
                    .param(name())
                    .param(ParamSpec::required("color", ParamKind::Color)),
                |scene, _, arguments| {
                    let object = scene.object_mut(arguments.str("name")?)?;
                    object.color = arguments.color("color")?;
                    Ok(json!(object))
                },
            )
            .add(
                ActionSpec::new("SetParent")
                    .param(name())
                    .param(ParamSpec::optional("parent", ParamKind::String)),
                Self::set_parent,
            )
            .add(ActionSpec::new("GetHierarchy"), Self::hierarchy)
            .add(
                ActionSpec::new("Select")
                    .param(name())
                    .param(
                        ParamSpec::optional("additive", ParamKind::Bool)
                            .with_default(json!(false)),
                    )
                    .describe("Selects and focuses an object"),
                Self::select,
            )
            .add(ActionSpec::new("GetSelection"), Self::selection);
    }
}

#[cfg(test)]
mod tests {
    use scenebridge_protocol::CommandName;
    use serde_json::Map;

    use crate::engine::EngineState;
    use crate::registry::Router;

    use super::*;

    struct Scene {
        router: Router,
        state: EngineState,
    }

    impl Scene {
        fn new() -> Self {
            let mut router = Router::new();
            router
                .register("scene", SceneHandler::new())
                .expect("register scene");
            Self {
                router,
                state: EngineState::default(),
            }
        }

        fn run(&mut self, action: &str, parameters: Value) -> Outcome {
            let name = CommandName::parse(&format!("scene.{action}")).expect("name");
            let map: Map<String, Value> = match parameters {
                Value::Object(map) => map,
                _ => Map::new(),
            };
            let mut context = ActionContext::new(&mut self.state, None);
            self.router.dispatch(&name, &map, &mut context)
        }
    }

    #[test]
    fn creates_objects_with_defaults() {
        let mut scene = Scene::new();
        let created = scene
            .run("Create", json!({"name": "Cube", "kind": "cube", "position": [0, 1, 0]}))
            .expect("create");
        assert_eq!(created["kind"], json!("Cube"));
        assert_eq!(created["scale"], json!([1.0, 1.0, 1.0]));
        assert_eq!(created["color"]["a"], json!(1.0));
        assert!(scene.run("Create", json!({"name": "Cube"})).is_err());
    }

    #[test]
    fn deleting_removes_descendants_and_session_references() {
        let mut scene = Scene::new();
        scene.run("Create", json!({"name": "Rig"})).expect("rig");
        scene
            .run("Create", json!({"name": "Arm", "parent": "Rig"}))
            .expect("arm");
        scene.run("Select", json!({"name": "Arm"})).expect("select");

        let deleted = scene.run("Delete", json!({"name": "Rig"})).expect("delete");
        assert_eq!(deleted["deleted"], json!(["Rig", "Arm"]));
        assert!(scene.state.session.selected().is_empty());
        assert_eq!(scene.state.session.focused(), None);
    }

    #[test]
    fn reparenting_rejects_cycles() {
        let mut scene = Scene::new();
        scene.run("Create", json!({"name": "A"})).expect("a");
        scene
            .run("Create", json!({"name": "B", "parent": "A"}))
            .expect("b");
        let error = scene
            .run("SetParent", json!({"name": "A", "parent": "B"}))
            .expect_err("cycle");
        assert!(error.to_string().contains("own descendant"));

        let hierarchy = scene.run("GetHierarchy", json!({})).expect("hierarchy");
        assert_eq!(hierarchy["roots"][0]["children"][0]["name"], json!("B"));
    }

    #[test]
    fn transforms_update_only_supplied_components() {
        let mut scene = Scene::new();
        scene
            .run("Create", json!({"name": "Cube", "position": [1, 2, 3]}))
            .expect("create");
        let updated = scene
            .run("SetTransform", json!({"name": "Cube", "scale": {"x": 2, "y": 2, "z": 2}}))
            .expect("transform");
        assert_eq!(updated["position"], json!([1.0, 2.0, 3.0]));
        assert_eq!(updated["scale"], json!([2.0, 2.0, 2.0]));
    }

    #[test]
    fn find_filters_by_fragment_and_kind() {
        let mut scene = Scene::new();
        scene
            .run("Create", json!({"name": "KeyLight", "kind": "Light"}))
            .expect("light");
        scene
            .run("Create", json!({"name": "FillLight", "kind": "Light"}))
            .expect("fill");
        scene
            .run("Create", json!({"name": "Floor", "kind": "Plane"}))
            .expect("floor");

        let lights = scene
            .run("Find", json!({"name_contains": "light"}))
            .expect("find");
        assert_eq!(lights["count"], json!(2));
        let planes = scene.run("Find", json!({"kind": "plane"})).expect("find");
        assert_eq!(planes["objects"][0]["name"], json!("Floor"));
    }
}
