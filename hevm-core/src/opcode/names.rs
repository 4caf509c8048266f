/// Catalog names indexed by opcode. Empty strings are table holes.
pub(super) const NAMES: [&str; 256] = [
    // 00
    "pushByte", "pushWord", "pushDWord", "pushWordVar",
    // 04
    "addMessageToStack", "", "", "wordArrayRead",
    // 08
    "", "", "", "wordArrayIndexedRead",
    // 0C
    "dup", "not", "eq", "neq",
    // 10
    "gt", "lt", "le", "ge",
    // 14
    "add", "sub", "mul", "div",
    // 18
    "land", "lor", "pop", "isAnyOf",
    // 1C
    "", "", "", "",
    // 20
    "", "", "", "",
    // 24
    "", "", "", "",
    // 28
    "", "", "", "",
    // 2C
    "", "", "", "",
    // 30
    "", "", "", "",
    // 34
    "", "", "", "",
    // 38
    "", "", "", "",
    // 3C
    "", "", "", "",
    // 40
    "", "", "", "writeWordVar",
    // 44
    "", "createSound", "", "wordArrayWrite",
    // 48
    "stringToInt", "getSoundStatus", "localizeArrayToRoom", "wordArrayIndexedWrite",
    // 4C
    "", "readConfigFile", "writeConfigFile", "wordVarInc",
    // 50
    "unknown50", "", "findObjectWithClassOf", "wordArrayInc",
    // 54
    "getObjectImageX", "getObjectImageY", "captureWizImage", "wordVarDec",
    // 58
    "getTimer", "setTimer", "unknown5A", "wordArrayDec",
    // 5C
    "if", "ifNot", "startScript", "startScriptQuick",
    // 60
    "startObject", "drawObject", "printWizImage", "getArrayDimSize",
    // 64
    "getNumFreeArrays", "stopObjectCode", "stopObjectCode", "endCutscene",
    // 68
    "cutscene", "", "freezeUnfreeze", "cursorCommand",
    // 6C
    "breakHere", "ifClassOfIs", "setClass", "getState",
    // 70
    "setState", "setOwner", "getOwner", "jump",
    // 74
    "startSound", "stopSound", "", "stopObjectScript",
    // 78
    "panCameraTo", "actorFollowCamera", "setCameraAt", "loadRoom",
    // 7C
    "stopScript", "walkActorToObj", "walkActorTo", "putActorAtXY",
    // 80
    "putActorAtObject", "faceActor", "animateActor", "doSentence",
    // 84
    "pickupObject", "loadRoomWithEgo", "", "getRandomNumber",
    // 88
    "getRandomNumberRange", "", "getActorMoving", "isScriptRunning",
    // 8C
    "getActorRoom", "getObjectX", "getObjectY", "getObjectOldDir",
    // 90
    "getActorWalkBox", "getActorCostume", "findInventory", "getInventoryCount",
    // 94
    "", "beginOverride", "endOverride", "setObjectName",
    // 98
    "isSoundRunning", "setBoxFlags", "", "resourceRoutines",
    // 9C
    "roomOps", "actorOps", "", "getActorFromXY",
    // A0
    "findObject", "pseudoRoom", "getActorElevation", "getVerbEntrypoint",
    // A4
    "arrayOps", "", "drawBox", "pop",
    // A8
    "getActorWidth", "wait", "getActorScaleX", "getActorAnimCounter1",
    // AC
    "drawWizPolygon", "isAnyOf", "quitPauseRestart", "isActorInBox",
    // B0
    "delay", "delaySeconds", "delayMinutes", "stopSentence",
    // B4
    "printLine", "printCursor", "printDebug", "printSystem",
    // B8
    "printActor", "printEgo", "talkActor", "talkEgo",
    // BC
    "dimArray", "stopObjectCode", "startObjectQuick", "startScriptQuick2",
    // C0
    "dim2dimArray", "traceStatus", "", "",
    // C4
    "abs", "distObjectObject", "distObjectPt", "distPtPt",
    // C8
    "kernelGetFunctions", "kernelSetFunctions", "delayFrames", "pickOneOf",
    // CC
    "pickOneOfDefault", "stampObject", "drawWizImage", "unknownCF",
    // D0
    "getDateTime", "stopTalking", "getAnimateVariable", "",
    // D4
    "shuffle", "jumpToScript", "band", "bor",
    // D8
    "isRoomScriptRunning", "closeFile", "openFile", "readFile",
    // DC
    "writeFile", "findAllObjects", "deleteFile", "rename",
    // E0
    "unknownE0", "getPixel", "localizeArrayToScript", "pickVarRandom",
    // E4
    "setBoxSet", "", "", "",
    // E8
    "", "seekFilePos", "redimArray", "readFilePos",
    // EC
    "unknownEC", "unknownED", "stringLen", "unknownEF",
    // F0
    "unknownF0", "unknownF1", "checkGlobQueue", "readINI",
    // F4
    "writeINI", "unknownF5", "unknownF6", "",
    // F8
    "getResourceSize", "setFilePath", "setWindowCaption", "polygonOps",
    // FC
    "polygonHit", "", "", "",
];
