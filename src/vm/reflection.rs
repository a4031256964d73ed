//! Cached reflection handles.
//!
//! Every cross-runtime call made by the rest of the system goes through a
//! handful of classes and method identifiers. They are resolved once, pinned
//! as global references, and published together.

use crate::embedding::{ClassRef, EmbeddingInterface, EnvPtr, MethodRef};
use crate::error::{Error, Result};

pub const STRING_CLASS: &str = "java/lang/String";
pub const OBJECT_CLASS: &str = "java/lang/Object";
pub const CLASS_CLASS: &str = "java/lang/Class";
pub const FIELD_CLASS: &str = "java/lang/reflect/Field";

const FOR_NAME_SIG: &str = "(Ljava/lang/String;ZLjava/lang/ClassLoader;)Ljava/lang/Class;";
const GET_NAME_SIG: &str = "()Ljava/lang/String;";
const GET_FIELD_SIG: &str = "(Ljava/lang/String;)Ljava/lang/reflect/Field;";
const GET_TYPE_SIG: &str = "()Ljava/lang/Class;";

/// Global class references and method identifiers used for class lookup and
/// field introspection.
///
/// A value of this type is always fully populated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReflectionHandles {
    pub string_class: ClassRef,
    pub object_class: ClassRef,
    pub class_class: ClassRef,
    pub field_class: ClassRef,
    /// `static Class.forName(String, boolean, ClassLoader)`
    pub for_name: MethodRef,
    /// `Class.getName()`
    pub get_name: MethodRef,
    /// `Class.getField(String)`
    pub get_field: MethodRef,
    /// `Field.getType()`
    pub get_type: MethodRef,
}

/// Resolve and pin every handle.
///
/// On failure, global references created so far are released and any
/// pending VM exception is cleared; nothing is returned to be published.
/// Guarding against repeated population is the caller's job.
pub fn populate(iface: &dyn EmbeddingInterface, env: EnvPtr) -> Result<ReflectionHandles> {
    let mut pinned = Pinned::new(iface, env);
    let handles = resolve(&mut pinned);
    match handles {
        Ok(handles) => {
            pinned.keep();
            tracing::debug!("reflection cache populated");
            Ok(handles)
        }
        Err(e) => {
            iface.exception_clear(env);
            tracing::error!(error = %e, "reflection cache population failed");
            Err(e)
        }
    }
}

fn resolve(pinned: &mut Pinned<'_>) -> Result<ReflectionHandles> {
    let string_class = pinned.class(STRING_CLASS)?;
    let object_class = pinned.class(OBJECT_CLASS)?;
    let class_class = pinned.class(CLASS_CLASS)?;
    let field_class = pinned.class(FIELD_CLASS)?;

    let iface = pinned.iface;
    let env = pinned.env;

    let for_name = iface
        .get_static_method_id(env, class_class, "forName", FOR_NAME_SIG)
        .ok_or_else(|| Error::method_not_found("Class", "forName"))?;
    let get_name = iface
        .get_method_id(env, class_class, "getName", GET_NAME_SIG)
        .ok_or_else(|| Error::method_not_found("Class", "getName"))?;
    let get_field = iface
        .get_method_id(env, class_class, "getField", GET_FIELD_SIG)
        .ok_or_else(|| Error::method_not_found("Class", "getField"))?;
    let get_type = iface
        .get_method_id(env, field_class, "getType", GET_TYPE_SIG)
        .ok_or_else(|| Error::method_not_found("Field", "getType"))?;

    Ok(ReflectionHandles {
        string_class,
        object_class,
        class_class,
        field_class,
        for_name,
        get_name,
        get_field,
        get_type,
    })
}

/// Global references created during one population attempt.
///
/// Released on drop unless [`Pinned::keep`] was called.
struct Pinned<'a> {
    iface: &'a dyn EmbeddingInterface,
    env: EnvPtr,
    globals: Vec<ClassRef>,
}

impl<'a> Pinned<'a> {
    fn new(iface: &'a dyn EmbeddingInterface, env: EnvPtr) -> Self {
        Self {
            iface,
            env,
            globals: Vec::with_capacity(4),
        }
    }

    /// Find `name` and replace the local reference with a global one.
    fn class(&mut self, name: &str) -> Result<ClassRef> {
        let local = self
            .iface
            .find_class(self.env, name)
            .ok_or_else(|| Error::class_not_found(name))?;
        let global = self.iface.new_global_ref(self.env, local);
        self.iface.delete_local_ref(self.env, local);

        let global = global.ok_or_else(|| Error::GlobalRef {
            class: name.to_string(),
        })?;
        self.globals.push(global);
        Ok(global)
    }

    fn keep(mut self) {
        self.globals.clear();
    }
}

impl Drop for Pinned<'_> {
    fn drop(&mut self) {
        for global in self.globals.drain(..) {
            self.iface.delete_global_ref(self.env, global);
        }
    }
}
